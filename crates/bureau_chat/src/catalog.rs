//! Built-in agent catalog.
//!
//! Agents are data, not subclasses: each entry pairs a profile with a
//! persona system prompt, an optional tool declaration table and a canned
//! tool result for simulated execution. Tool *selection* is the model's job;
//! this side only declares capabilities and renders the calls.

use bureau_core::{AgentProfile, Task, TaskStatus};
use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::provider::ToolDecl;

/// Agent id used when none is specified
pub const DEFAULT_AGENT_ID: &str = "chief-of-staff";

/// The built-in workspace agents
pub fn builtin_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new(
            "chief-of-staff",
            "Craig",
            "Chief of Staff",
            "Coordinates priorities, tracks deadlines, and keeps the business running smoothly across every department.",
            "🧭",
        ),
        AgentProfile::new(
            "designer",
            "Jules",
            "Designer",
            "Creates visual assets, refines brand identity, and ensures every customer touchpoint looks intentional.",
            "🎨",
        ),
        AgentProfile::new(
            "finance",
            "Derek",
            "Finance",
            "Monitors cash flow, prepares reports, and flags financial risks before they become problems.",
            "📊",
        ),
        AgentProfile::new(
            "legal",
            "Nadia",
            "Legal",
            "Reviews contracts, tracks regulatory requirements, and ensures the business stays protected.",
            "⚖️",
        ),
    ]
}

/// Look up a built-in agent by id
pub fn agent(agent_id: &str) -> Option<AgentProfile> {
    builtin_agents().into_iter().find(|a| a.id == agent_id)
}

/// Persona system prompt for an agent, falling back to a generic assistant
/// prompt for unknown ids. Every prompt ends with the shared plan-format
/// instruction so multi-step answers open with a parseable plan block.
pub fn system_prompt(agent_id: &str) -> String {
    let persona = match agent_id {
        "chief-of-staff" => CHIEF_OF_STAFF_PROMPT,
        "designer" => DESIGNER_PROMPT,
        "finance" => FINANCE_PROMPT,
        "legal" => LEGAL_PROMPT,
        _ => return format!("You are Bureau, an AI assistant.{PLAN_FORMAT}"),
    };
    format!("{persona}{PLAN_FORMAT}")
}

/// Tool declarations for an agent, one role-relevant tool each
pub fn tool_decls(agent_id: &str) -> Vec<ToolDecl> {
    match agent_id {
        "chief-of-staff" => vec![ToolDecl {
            name: "create_presentation".to_string(),
            description: "Create a business presentation or slide deck on a given topic. \
                          Use whenever the user asks to create, draft, build, or generate \
                          a presentation, deck, or slides."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "The presentation title"},
                    "slides": {"type": "number", "description": "Estimated number of slides"},
                    "audience": {"type": "string", "description": "Target audience"}
                },
                "required": ["title"]
            }),
        }],
        "designer" => vec![ToolDecl {
            name: "generate_deck_design".to_string(),
            description: "Generate a visual slide deck design or presentation template. \
                          Use when the user asks to design or build a presentation, pitch \
                          deck, or slide deck."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "The deck title or theme"},
                    "style": {"type": "string", "description": "Visual style (e.g. minimal, bold)"},
                    "slides": {"type": "number", "description": "Number of slides"}
                },
                "required": ["title"]
            }),
        }],
        "finance" => vec![ToolDecl {
            name: "build_financial_model".to_string(),
            description: "Build a financial model, report, or spreadsheet. Use when the \
                          user asks to create or generate a financial report, model, or deck."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "The model or report title"},
                    "period": {"type": "string", "description": "Time period covered"},
                    "scenarios": {"type": "number", "description": "Number of scenarios"}
                },
                "required": ["title"]
            }),
        }],
        "legal" => vec![ToolDecl {
            name: "draft_document".to_string(),
            description: "Draft a legal document, contract, or memo. Use when the user asks \
                          to create, draft, or write a contract, agreement, or legal memo."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "document_type": {"type": "string", "description": "Type of document"},
                    "title": {"type": "string", "description": "Document title"},
                    "parties": {"type": "string", "description": "Relevant parties involved"}
                },
                "required": ["document_type", "title"]
            }),
        }],
        _ => Vec::new(),
    }
}

/// Canned result returned after the simulated tool execution delay
pub fn canned_tool_result(tool_name: &str) -> serde_json::Value {
    match tool_name {
        "create_presentation" => json!({
            "status": "completed",
            "slides_generated": 12,
            "format": "Google Slides",
            "url": "https://slides.google.com/d/example-id",
            "sections": ["Executive Summary", "Market Opportunity", "Financial Overview", "Q&A"]
        }),
        "generate_deck_design" => json!({
            "status": "completed",
            "slides": 10,
            "theme": "Clarity Design System",
            "export_format": "Figma + PDF",
            "url": "https://figma.com/file/example-id"
        }),
        "build_financial_model" => json!({
            "status": "completed",
            "workbook_url": "https://sheets.google.com/d/example-id",
            "scenarios": ["Base", "Bull", "Bear"],
            "tabs": ["Summary", "Revenue Model", "Burn Analysis", "Runway"]
        }),
        "draft_document" => json!({
            "status": "completed",
            "pages": 4,
            "format": "Google Docs",
            "url": "https://docs.google.com/d/example-id",
            "review_required": true
        }),
        _ => json!({"status": "completed"}),
    }
}

/// Seed tasks so a fresh workspace shows realistic per-agent statuses
pub fn seed_tasks() -> Vec<Task> {
    fn task(
        id: &str,
        agent_id: &str,
        title: &str,
        description: &str,
        status: TaskStatus,
    ) -> Task {
        let created = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        Task {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status,
            created_at: created,
            updated_at: created,
            chat_created: false,
            message_id: None,
        }
    }

    vec![
        task(
            "cs-01",
            "chief-of-staff",
            "Prepare Q1 Board Update Deck",
            "Compile OKR progress, hiring pipeline status, and SOC 2 timeline for the board call.",
            TaskStatus::InProgress,
        ),
        task(
            "cs-02",
            "chief-of-staff",
            "Draft Series B Narrative Outline",
            "First-pass narrative arc for the Series B deck — growth story, market timing, team.",
            TaskStatus::Scheduled,
        ),
        task(
            "de-01",
            "designer",
            "Mobile App v1 Final Polish Pass",
            "Apply final spacing, icon refinements, and dark mode fixes before the Q1 launch.",
            TaskStatus::NeedsInput,
        ),
        task(
            "de-02",
            "designer",
            "Website Homepage Refresh",
            "Update hero copy and illustration for the announcement messaging.",
            TaskStatus::Done,
        ),
        task(
            "fi-01",
            "finance",
            "January MRR Reconciliation",
            "Reconcile Stripe MRR against the financial model before the board call.",
            TaskStatus::InProgress,
        ),
        task(
            "fi-02",
            "finance",
            "Series B Financial Model — Base/Bull/Bear",
            "Three-scenario ARR and burn model to anchor the raise target.",
            TaskStatus::Scheduled,
        ),
        task(
            "le-01",
            "legal",
            "Clearfield DPA & Security Addendum",
            "Review the security addendum and finalize the outstanding DPA to unblock renewal.",
            TaskStatus::NeedsInput,
        ),
        task(
            "le-02",
            "legal",
            "SaaS MSA Template Refresh",
            "Update the MSA template to reflect current data processing and AI provisions.",
            TaskStatus::Scheduled,
        ),
    ]
}

const PLAN_FORMAT: &str = r#"

**Action plan format:**
When performing multi-step work (creating documents, drafting content, running analysis, building models), begin your response with a plan block in this exact format:
<plan>
Short task name (3-6 words)
First step label
Second step label
Third step label
</plan>
The first line is a concise task name. Remaining lines are steps as short present-tense verb phrases. Use 3-5 steps. Omit the plan block entirely for simple questions, explanations, or short conversational replies."#;

const CHIEF_OF_STAFF_PROMPT: &str = r#"You are the Chief of Staff at Lucidly, a Series A RevOps intelligence platform for B2B SaaS companies. You serve as the operating brain of the company: weekly and quarterly OKR tracking, cross-functional dependencies and blockers, the hiring pipeline, and board communication rhythm.

Decisive and big-picture. You cut through noise and give clear recommendations, not optionality for its own sake. Lead with the answer, then the reasoning. If the user gives vague input, make reasonable assumptions and state them."#;

const DESIGNER_PROMPT: &str = r#"You are the Designer at Lucidly, a Series A RevOps SaaS company. You own product design, brand identity, and all visual output — from the web app UI to pitch deck slides to marketing assets. The design system is called "Clarity" (deep indigo primary, warm off-white background, Inter typeface).

Opinionated on craft, but not precious. Give concrete direction — not "consider X" but "use X because Y". When reviewing work, structure feedback as: what works, what doesn't, specific fix."#;

const FINANCE_PROMPT: &str = r#"You are the Finance lead at Lucidly, a Series A RevOps SaaS company, acting as a CFO-level advisor. You own financial modeling, reporting, and fundraising numbers: ARR, burn, runway, and the Series B target.

Numbers-first and precise. Lead with the number or trend, then the implication, then the recommendation. When presenting runway or burn scenarios, always show best/base/worst case. Never speculate on tax or legal treatment — defer those to the Legal agent."#;

const LEGAL_PROMPT: &str = r#"You are the General Counsel at Lucidly, a Series A RevOps SaaS company: a practical, business-oriented lawyer advising on contracts, compliance, IP, and corporate governance.

Careful, qualifying, and risk-aware — but actionable. Structure advice as: Issue, risk level, recommendation, next step. Always state when something requires outside counsel. Give the practical answer first, detail on request."#;
