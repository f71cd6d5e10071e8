//! Capability SDK stubs
//!
//! Every helper logs its invocation through the run's console and returns a
//! canned value wrapped in a settled promise. Nothing here performs I/O.
//!
//! Always available: `ai`, `db`, `email`, `slack`, `zendesk`,
//! `knowledge_base`, `clearbit`. `github`, `linkedin` and `salesforce` are
//! only populated when the run's integration matches, and are `null`
//! otherwise.

use super::super::env::Env;
use super::super::errors::ErrorInfo;
use super::super::types::{Control, EvalResult, PropertyMap, Val};
use super::super::vm::{throw, VM};
use super::{arg, namespace, web, StdlibFunc};
use crate::sandbox::console::ConsoleLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkCall {
    AiExtract,
    AiCall,
    AiSummarize,
    AiClassify,
    AiPredictScore,
    DbGet,
    DbSet,
    DbDelete,
    DbList,
    EmailSend,
    EmailSendTemplate,
    SlackReply,
    SlackSendMessage,
    ZendeskCreateTicket,
    KnowledgeBaseQuery,
    ClearbitEnrichCompany,
    GithubCreatePr,
    GithubComment,
    LinkedinAnalyzeProfile,
    SalesforceUpdateLead,
    SalesforceCreateOpportunity,
}

/// Initial contents of the per-run key-value store
pub fn seed_db() -> PropertyMap {
    [
        ("visit_counter".to_string(), Val::Num(42.0)),
        (
            "user_preferences".to_string(),
            Val::obj_from([("theme", Val::str("dark")), ("notifications", Val::Bool(true))]),
        ),
        (
            "recent_items".to_string(),
            Val::list(vec![Val::str("item1"), Val::str("item2"), Val::str("item3")]),
        ),
    ]
    .into_iter()
    .collect()
}

fn sdk_namespace(members: &[(&str, SdkCall)]) -> Val {
    let members: Vec<(&str, StdlibFunc)> = members
        .iter()
        .map(|(name, call)| (*name, StdlibFunc::Sdk(*call)))
        .collect();
    namespace(&members)
}

/// Declare the SDK namespaces and web stubs in `env`
pub fn inject_sdk(env: &Env, integration: &str) {
    env.declare(
        "ai",
        sdk_namespace(&[
            ("extract", SdkCall::AiExtract),
            ("call", SdkCall::AiCall),
            ("summarize", SdkCall::AiSummarize),
            ("classify", SdkCall::AiClassify),
            ("predict_score", SdkCall::AiPredictScore),
        ]),
        true,
    );
    env.declare(
        "db",
        sdk_namespace(&[
            ("get", SdkCall::DbGet),
            ("set", SdkCall::DbSet),
            ("delete", SdkCall::DbDelete),
            ("list", SdkCall::DbList),
        ]),
        true,
    );
    env.declare(
        "email",
        sdk_namespace(&[
            ("send", SdkCall::EmailSend),
            ("send_template", SdkCall::EmailSendTemplate),
        ]),
        true,
    );
    env.declare(
        "slack",
        sdk_namespace(&[
            ("reply", SdkCall::SlackReply),
            ("send_message", SdkCall::SlackSendMessage),
        ]),
        true,
    );
    env.declare(
        "zendesk",
        sdk_namespace(&[("create_ticket", SdkCall::ZendeskCreateTicket)]),
        true,
    );
    env.declare(
        "knowledge_base",
        sdk_namespace(&[("query", SdkCall::KnowledgeBaseQuery)]),
        true,
    );
    env.declare(
        "clearbit",
        sdk_namespace(&[("enrich_company", SdkCall::ClearbitEnrichCompany)]),
        true,
    );

    let github = match integration {
        "github" => sdk_namespace(&[
            ("create_pr", SdkCall::GithubCreatePr),
            ("comment", SdkCall::GithubComment),
        ]),
        _ => Val::Null,
    };
    env.declare("github", github, true);

    let linkedin = match integration {
        "linkedin" => sdk_namespace(&[("analyze_profile", SdkCall::LinkedinAnalyzeProfile)]),
        _ => Val::Null,
    };
    env.declare("linkedin", linkedin, true);

    let salesforce = match integration {
        "salesforce" => sdk_namespace(&[
            ("update_lead", SdkCall::SalesforceUpdateLead),
            ("create_opportunity", SdkCall::SalesforceCreateOpportunity),
        ]),
        _ => Val::Null,
    };
    env.declare("salesforce", salesforce, true);

    web::inject_web(env);
}

/// Log like `console.log("[SDK] ...", arg, ...)`
fn sdk_log(vm: &VM, parts: Vec<Val>) {
    vm.log_values(ConsoleLevel::Log, &parts);
}

fn label(text: &str) -> Val {
    Val::str(text)
}

/// SDK helpers are async: errors become rejected promises
pub fn call_sdk(vm: &mut VM, call: &SdkCall, args: &[Val]) -> EvalResult {
    match run_sdk(vm, call, args) {
        Ok(value) => Ok(Val::fulfilled(value)),
        Err(Control::Throw(e)) => Ok(Val::rejected(e)),
        Err(other) => Err(other),
    }
}

fn run_sdk(vm: &mut VM, call: &SdkCall, args: &[Val]) -> EvalResult {
    let a0 = arg(args, 0);
    let a1 = arg(args, 1);

    let value = match call {
        /* ---------- ai ---------- */
        SdkCall::AiExtract => {
            sdk_log(vm, vec![label("[SDK] AI Extract called with:"), a0]);
            Val::obj_from([
                ("full_name", Val::str("John Doe")),
                ("phone", Val::str("+1 (555) 123-4567")),
                ("work_experience", Val::str("5 years at ABC Corp")),
                (
                    "summary",
                    Val::str("Experienced software developer with focus on backend systems"),
                ),
            ])
        }
        SdkCall::AiCall => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] AI Call initiated to:"),
                    a0,
                    label("with options:"),
                    a1,
                ],
            );
            Val::str("Mock conversation data")
        }
        SdkCall::AiSummarize => {
            let length = if a0.is_nullish() {
                Val::Undefined
            } else {
                vm.get_property(&a0, &Val::str("length"))?
            };
            let length = if length.is_truthy() { length } else { Val::Num(0.0) };
            sdk_log(
                vm,
                vec![label("[SDK] AI Summarize called with text length:"), length],
            );
            Val::str("Candidate has relevant experience and skills for the position.")
        }
        SdkCall::AiClassify => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] AI Classify called with:"),
                    Val::obj_from([("text", a0), ("categories", a1.clone())]),
                ],
            );
            vm.get_property(&a1, &Val::Num(0.0))?
        }
        SdkCall::AiPredictScore => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] AI Predict Score called with:"),
                    Val::obj_from([("data", a0), ("options", a1)]),
                ],
            );
            Val::Num(0.85)
        }

        /* ---------- db ---------- */
        SdkCall::DbGet => {
            sdk_log(vm, vec![label("[SDK] DB Get:"), a0.clone()]);
            match vm.db.get(&a0.to_display()) {
                Some(v) if v.is_truthy() => v.clone(),
                _ => Val::Null,
            }
        }
        SdkCall::DbSet => {
            sdk_log(
                vm,
                vec![label("[SDK] DB Set:"), a0.clone(), label("to value:"), a1.clone()],
            );
            vm.db.insert(a0.to_display(), a1);
            Val::Bool(true)
        }
        SdkCall::DbDelete => {
            sdk_log(vm, vec![label("[SDK] DB Delete:"), a0.clone()]);
            vm.db.remove(&a0.to_display());
            Val::Bool(true)
        }
        SdkCall::DbList => {
            sdk_log(vm, vec![label("[SDK] DB List with prefix:"), a0.clone()]);
            let prefix = if a0.is_truthy() {
                a0.to_display()
            } else {
                String::new()
            };
            Val::list(
                vm.db
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .map(|k| Val::str(k.clone()))
                    .collect(),
            )
        }

        /* ---------- email ---------- */
        SdkCall::EmailSend => {
            sdk_log(
                vm,
                vec![label("[SDK] Email sent to:"), a0, label("with body:"), a1],
            );
            Val::obj_from([
                ("success", Val::Bool(true)),
                ("messageId", Val::str("mock-message-id-123")),
            ])
        }
        SdkCall::EmailSendTemplate => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] Email template sent:"),
                    a0,
                    label("with options:"),
                    a1,
                ],
            );
            Val::obj_from([
                ("success", Val::Bool(true)),
                ("messageId", Val::str("mock-template-id-123")),
            ])
        }

        /* ---------- slack ---------- */
        SdkCall::SlackReply | SdkCall::SlackSendMessage => {
            let prefix = match call {
                SdkCall::SlackReply => "[SDK] Slack reply to channel:",
                _ => "[SDK] Slack message sent to channel:",
            };
            sdk_log(
                vm,
                vec![label(prefix), a0.clone(), label("with message:"), a1],
            );
            Val::obj_from([("ts", Val::str("timestamp-123")), ("channel", a0)])
        }

        /* ---------- zendesk / knowledge base / clearbit ---------- */
        SdkCall::ZendeskCreateTicket => {
            sdk_log(vm, vec![label("[SDK] Zendesk ticket created with options:"), a0]);
            Val::obj_from([("id", Val::str("ticket-123")), ("status", Val::str("new"))])
        }
        SdkCall::KnowledgeBaseQuery => {
            sdk_log(vm, vec![label("[SDK] Knowledge base queried with:"), a0]);
            Val::str("Here is the information you requested from the knowledge base.")
        }
        SdkCall::ClearbitEnrichCompany => {
            sdk_log(vm, vec![label("[SDK] Clearbit company enrichment for:"), a0.clone()]);
            let Val::Str(company) = &a0 else {
                return Err(throw(ErrorInfo::type_error(
                    "company.toLowerCase is not a function",
                )));
            };
            let domain: String = company
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            Val::obj_from([
                ("name", a0.clone()),
                ("domain", Val::Str(format!("{}.com", domain))),
                (
                    "category",
                    Val::obj_from([("industry", Val::str("Technology"))]),
                ),
                (
                    "metrics",
                    Val::obj_from([
                        ("employees", Val::Num(250.0)),
                        ("annualRevenue", Val::Num(5_000_000.0)),
                    ]),
                ),
            ])
        }

        /* ---------- integration specific ---------- */
        SdkCall::GithubCreatePr => {
            sdk_log(vm, vec![label("[SDK] GitHub PR created:"), a0]);
            Val::obj_from([
                ("id", Val::str("pr-123")),
                ("url", Val::str("https://github.com/user/repo/pull/123")),
            ])
        }
        SdkCall::GithubComment => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] GitHub comment added to issue/PR:"),
                    Val::obj_from([("issue", a0), ("comment", a1)]),
                ],
            );
            Val::obj_from([("id", Val::str("comment-123"))])
        }
        SdkCall::LinkedinAnalyzeProfile => {
            sdk_log(vm, vec![label("[SDK] LinkedIn profile analyzed:"), a0]);
            Val::obj_from([
                (
                    "skills",
                    Val::list(vec![
                        Val::str("JavaScript"),
                        Val::str("React"),
                        Val::str("Node.js"),
                    ]),
                ),
                ("experience", Val::str("5 years")),
            ])
        }
        SdkCall::SalesforceUpdateLead => {
            sdk_log(
                vm,
                vec![
                    label("[SDK] Salesforce lead updated:"),
                    Val::obj_from([("lead", a0), ("data", a1)]),
                ],
            );
            Val::obj_from([("success", Val::Bool(true)), ("id", Val::str("lead-123"))])
        }
        SdkCall::SalesforceCreateOpportunity => {
            sdk_log(vm, vec![label("[SDK] Salesforce opportunity created:"), a0]);
            Val::obj_from([("success", Val::Bool(true)), ("id", Val::str("opp-123"))])
        }
    };
    Ok(value)
}
