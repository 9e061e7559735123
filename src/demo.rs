//! Built-in demonstration dataset shown while demo mode is on.

use chrono::{Duration, Utc};

use crate::models::{Comparison, ComparisonRow, Conversation, Message, NormalizedReply, Product};

fn product(name: &str, description: &str, features: &[&str], price: &str, rationale: &str) -> Product {
    Product {
        name: name.to_string(),
        description: Some(description.to_string()),
        features: features.iter().map(|f| f.to_string()).collect(),
        price: Some(price.to_string()),
        rationale: Some(rationale.to_string()),
    }
}

fn row(name: &str, values: &[&str]) -> ComparisonRow {
    ComparisonRow {
        name: name.to_string(),
        values: values.iter().map(|v| Some(v.to_string())).collect(),
    }
}

fn conversation(question: &str, reply: NormalizedReply, age_hours: i64) -> Conversation {
    let mut conversation = Conversation::new(Some(question));
    let started = Utc::now() - Duration::hours(age_hours);

    let mut user = Message::user(question);
    user.timestamp = started;
    let mut assistant = Message::assistant(reply);
    assistant.timestamp = started + Duration::seconds(4);

    conversation.created_at = started;
    conversation.updated_at = assistant.timestamp;
    conversation.messages = vec![user, assistant];
    conversation
}

/// Fresh copy of the demo conversations, newest first.
pub fn conversations() -> Vec<Conversation> {
    vec![
        conversation(
            "I need a CRM for a small team.",
            NormalizedReply {
                text: "## CRM picks for small teams\n\
                       For a team under ten people, these two stand out:\n\
                       - **HubSpot CRM** if you want to start free\n\
                       - **Pipedrive** if your process is pipeline-driven"
                    .to_string(),
                products: vec![
                    product(
                        "HubSpot CRM",
                        "All-in-one CRM with a generous free tier.",
                        &["Contact management", "Email tracking", "Deal pipelines"],
                        "Free, paid tiers from $20/user/month",
                        "Lowest cost of entry and easy onboarding.",
                    ),
                    product(
                        "Pipedrive",
                        "Sales-focused CRM built around visual pipelines.",
                        &["Visual pipelines", "Automations", "Mobile app"],
                        "From $14/user/month",
                        "Fits teams whose work is organised around deal stages.",
                    ),
                ],
                comparison: Some(Comparison {
                    attributes: vec![
                        "Starting price".to_string(),
                        "Free tier".to_string(),
                        "Best for".to_string(),
                    ],
                    products: vec![
                        row("HubSpot CRM", &["$0", "Yes", "Marketing + sales"]),
                        row("Pipedrive", &["$14/user", "No", "Pipeline sales"]),
                    ],
                }),
            },
            2,
        ),
        conversation(
            "Best project management tool for remote teams?",
            NormalizedReply {
                text: "**Asana** is a solid default for remote teams that need clear ownership."
                    .to_string(),
                products: vec![product(
                    "Asana",
                    "Work management platform for cross-functional teams.",
                    &["Timelines", "Workload view", "Integrations"],
                    "Free, paid tiers from $10.99/user/month",
                    "Strong async workflows and clear task ownership.",
                )],
                comparison: None,
            },
            26,
        ),
    ]
}
