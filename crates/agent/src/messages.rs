//! User-facing reply text

use stack_advisor_config::PillarCatalog;
use stack_advisor_core::ConversationSession;

pub const NO_INPUT: &str = "No input provided.";
pub const GENERATION_APOLOGY: &str = "AI processing error. Please try again later.";
pub const TECHNICAL_DIFFICULTIES: &str = "We're experiencing technical difficulties. Please try again.";
pub const TURN_TIMEOUT: &str = "Request timed out. Please try again.";
pub const CONFIRM_SUMMARY: &str = "Please confirm the summary before we proceed.";
pub const CLOSING: &str =
    "Thanks for walking through your requirements with me. This conversation is complete; start a new chat to design another stack.";
pub const OPENING: &str = "👋 Welcome! Say hello whenever you're ready to start designing your technology stack.";

const PROJECT_QUESTION: &str =
    "What are you trying to build? Describe your project and the problem it solves.";

pub fn greeting(assistant_name: &str) -> String {
    format!(
        "👋 Hello! I'm your {}. I specialize in designing optimal technology stacks.\n\n\
         Let's start with your project goal. {}",
        assistant_name, PROJECT_QUESTION
    )
}

pub fn domain_question(common_domains: &[String]) -> String {
    let mut text = String::from(
        "Great, thanks for the overview. Which industry or domain does this project belong to?\n\n\
         Common domains include:\n",
    );
    for domain in common_domains {
        text.push_str("• ");
        text.push_str(domain);
        text.push('\n');
    }
    text.push_str("\nFeel free to name a different one.");
    text
}

pub fn domain_known(domain: &str, insight: &str) -> String {
    format!("🏷️ Domain noted: {}. {}", domain, insight)
}

pub fn domain_added(domain: &str, similar: &[String], insight: &str) -> String {
    let mut text = format!("🆕 {} is a new domain for me, so I've added it.", domain);
    if !similar.is_empty() {
        text.push_str(&format!(" Similar domains I know: {}.", similar.join(", ")));
    }
    text.push(' ');
    text.push_str(insight);
    text
}

pub fn pillar_intro(pillar: &str, question: &str) -> String {
    format!("📋 Now let's discuss {} requirements.\n\n{}", pillar, question)
}

/// Render the collected inputs, pillars in catalog order.
pub fn summary(session: &ConversationSession, catalog: &PillarCatalog) -> String {
    let mut text = String::from("✅ Summary of your inputs:\n\n");
    text.push_str(&format!(
        "Project: {}\n",
        session.initiative.as_deref().unwrap_or("-")
    ));
    text.push_str(&format!(
        "Domain: {}\n",
        session.domain.as_deref().unwrap_or("-")
    ));

    for definition in catalog.definitions() {
        let Some(answers) = session.answers_for(&definition.pillar) else {
            continue;
        };
        text.push_str(&format!("\n📋 {}:\n", definition.pillar));
        for question in &definition.questions {
            if let Some(answer) = answers.get(question) {
                text.push_str(&format!("• {}: {}\n", question, answer));
            }
        }
    }

    // Answers kept from pillars no longer in the catalog
    for (pillar, answers) in &session.pillar_responses {
        if catalog.contains(pillar) || answers.is_empty() {
            continue;
        }
        text.push_str(&format!("\n📋 {}:\n", pillar));
        for (question, answer) in answers {
            text.push_str(&format!("• {}: {}\n", question, answer));
        }
    }

    text.push_str("\nDoes this look correct? (yes/no)");
    text
}

pub fn stack_reply(stack: &str) -> String {
    format!(
        "🧱 Here's your tailored tech stack:\n\n{}\n\nWould you like to make any adjustments or need clarification?",
        stack
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_advisor_config::PillarDefinition;

    #[test]
    fn test_greeting_names_role() {
        let text = greeting("AI Solution Architect");
        assert!(text.contains("AI Solution Architect"));
        assert!(text.contains("technology stacks"));
    }

    #[test]
    fn test_summary_follows_catalog_order() {
        let catalog = PillarCatalog::new(vec![
            PillarDefinition {
                pillar: "Scalability".to_string(),
                questions: vec!["Users?".to_string()],
            },
            PillarDefinition {
                pillar: "Budget".to_string(),
                questions: vec!["Monthly spend?".to_string()],
            },
        ])
        .unwrap();

        let mut session = ConversationSession::new("s1", None);
        session.initiative = Some("Clinic system".to_string());
        session.domain = Some("Healthcare".to_string());
        session
            .pillar_responses
            .entry("Budget".to_string())
            .or_default()
            .insert("Monthly spend?".to_string(), "$500".to_string());
        session
            .pillar_responses
            .entry("Scalability".to_string())
            .or_default()
            .insert("Users?".to_string(), "10k".to_string());

        let text = summary(&session, &catalog);
        let scalability = text.find("📋 Scalability").unwrap();
        let budget = text.find("📋 Budget").unwrap();
        assert!(scalability < budget);
        assert!(text.contains("Project: Clinic system"));
        assert!(text.contains("• Monthly spend?: $500"));
        assert!(text.ends_with("(yes/no)"));
        assert!(!text.contains("edit"));
    }

    #[test]
    fn test_domain_added_lists_similar() {
        let text = domain_added("Agritech", &["Agriculture".to_string()], "Insight.");
        assert!(text.contains("Agriculture"));
        assert!(text.ends_with("Insight."));
    }
}
