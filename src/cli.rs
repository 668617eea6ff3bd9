//! Command-line surface

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::ai::{CopyRequest, GeneratedCopy};
use crate::billing::PlanTier;
use crate::commands::{self, AccountStatus, GenerationOutcome};
use crate::error::AppError;
use crate::identity::normalize;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "anuncia")]
#[command(about = "Ad copy generation with free-tier metering")]
#[command(version)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the account key an email maps to
    Normalize { email: String },

    /// Show plan and usage for an account
    Status {
        #[arg(long)]
        email: String,
    },

    /// Generate one ad
    Generate {
        #[arg(long)]
        email: String,
        #[arg(short, long)]
        description: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        platform: Option<String>,
    },

    /// Change an account's plan (operator only)
    SetPlan {
        /// Email of the operator making the change
        #[arg(long)]
        operator: String,
        #[arg(long)]
        email: String,
        /// free, essential or premium
        #[arg(long)]
        tier: PlanTier,
    },

    /// Rate a generated ad from 1 to 5
    Feedback {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        input: String,
        #[arg(long)]
        response: String,
    },

    /// Manage the generation API key
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Store a key in the OS keychain
    Set { api_key: String },
    /// Remove the stored key
    Delete,
    /// Show whether a key is available
    Status,
}

/// Run one parsed command against `state`
pub async fn execute(cli: Cli, state: &AppState) -> Result<(), AppError> {
    let json = cli.json;

    match cli.command {
        Command::Normalize { email } => {
            let key = normalize(&email);
            emit(json, &serde_json::json!({ "accountKey": key }), || key.clone())
        }
        Command::Status { email } => {
            let status = commands::get_account_status(state, &email).await?;
            emit(json, &status, || format_status(&status))
        }
        Command::Generate {
            email,
            description,
            name,
            audience,
            tone,
            platform,
        } => {
            let request = CopyRequest {
                product_description: description,
                product_name: name,
                target_audience: audience,
                tone,
                platform,
            };
            let outcome = commands::generate_ad(state, &email, request).await?;
            emit(json, &outcome, || format_outcome(&outcome))
        }
        Command::SetPlan {
            operator,
            email,
            tier,
        } => {
            let account = commands::set_plan(state, &operator, &email, tier).await?;
            emit(json, &account, || {
                format!("{} is now on the {} plan", account.account_key, account.plan_tier)
            })
        }
        Command::Feedback {
            email,
            rating,
            input,
            response,
        } => {
            let entry = commands::submit_feedback(state, &email, rating, &input, &response).await?;
            emit(json, &entry, || "Thanks for the feedback".to_string())
        }
        Command::Key { action } => match action {
            KeyCommand::Set { api_key } => {
                commands::set_api_key(&api_key)?;
                emit(json, &serde_json::json!({ "stored": true }), || "API key stored".to_string())
            }
            KeyCommand::Delete => {
                commands::delete_api_key()?;
                emit(json, &serde_json::json!({ "deleted": true }), || "API key deleted".to_string())
            }
            KeyCommand::Status => {
                let status = commands::api_key_status(state);
                emit(json, &status, || {
                    if status.configured {
                        format!("{} key configured", status.provider)
                    } else {
                        format!("{} key not configured", status.provider)
                    }
                })
            }
        },
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), AppError> {
    if json {
        let rendered = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::InvalidInput(format!("Failed to render JSON: {}", e)))?;
        println!("{}", rendered);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn format_usage(tier: PlanTier, usage_count: u32, free_limit: u32, remaining: Option<u32>) -> String {
    match remaining {
        Some(left) if tier.is_metered() => {
            format!("{}/{} ads used, {} left", usage_count, free_limit, left)
        }
        _ => "unlimited".to_string(),
    }
}

fn format_status(status: &AccountStatus) -> String {
    let account = &status.account;
    let mut out = format!(
        "{} [{}{}]: {}",
        account.account_key,
        account.plan_tier,
        if account.operator { ", operator" } else { "" },
        format_usage(account.plan_tier, account.usage_count, status.free_limit, status.remaining)
    );
    if status.simulated {
        out.push_str("\n(simulated mode: usage is not saved)");
    }
    out
}

fn format_copy(copy: &GeneratedCopy) -> String {
    let mut out = format!("{}\n\n{}\n\n> {}", copy.title, copy.body, copy.call_to_action);

    if !copy.audience_suggestions.is_empty() {
        out.push_str("\n\nAudiences:");
        for audience in &copy.audience_suggestions {
            out.push_str(&format!("\n  - {}", audience));
        }
    }

    if let Some(script) = &copy.video_script {
        out.push_str(&format!("\n\nVideo script\n  Hook: {}", script.hook));
        for (i, scene) in script.scenes.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, scene));
        }
        out.push_str(&format!("\n  Closing: {}", script.closing));
    }

    out
}

fn format_outcome(outcome: &GenerationOutcome) -> String {
    let usage = match outcome.remaining {
        Some(left) => format!("{} free ads left", left),
        None => "unlimited plan".to_string(),
    };
    format!("{}\n\n({})", format_copy(&outcome.copy), usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::VideoScript;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "anuncia",
            "--json",
            "generate",
            "--email",
            "a@b.com",
            "-d",
            "Sabonete artesanal",
            "--tone",
            "leve",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Generate {
                email,
                description,
                tone,
                name,
                ..
            } => {
                assert_eq!(email, "a@b.com");
                assert_eq!(description, "Sabonete artesanal");
                assert_eq!(tone.as_deref(), Some("leve"));
                assert!(name.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_set_plan_tier() {
        let cli = Cli::try_parse_from([
            "anuncia", "set-plan", "--operator", "o@x.com", "--email", "c@x.com", "--tier", "Premium",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::SetPlan { tier: PlanTier::Premium, .. }));

        assert!(Cli::try_parse_from([
            "anuncia", "set-plan", "--operator", "o@x.com", "--email", "c@x.com", "--tier", "gold",
        ])
        .is_err());
    }

    #[test]
    fn test_feedback_rating_range() {
        let parse = |rating: &str| {
            Cli::try_parse_from([
                "anuncia", "feedback", "--email", "a@b.com", "--rating", rating, "--input", "i",
                "--response", "r",
            ])
        };
        assert!(parse("5").is_ok());
        assert!(parse("0").is_err());
        assert!(parse("6").is_err());
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(format_usage(PlanTier::Free, 1, 3, Some(2)), "1/3 ads used, 2 left");
        assert_eq!(format_usage(PlanTier::Premium, 0, 3, None), "unlimited");
    }

    #[test]
    fn test_format_copy_with_script() {
        let copy = GeneratedCopy {
            title: "T".to_string(),
            body: "B".to_string(),
            call_to_action: "C".to_string(),
            audience_suggestions: vec!["noivas".to_string()],
            video_script: Some(VideoScript {
                hook: "H".to_string(),
                scenes: vec!["S1".to_string(), "S2".to_string()],
                closing: "F".to_string(),
            }),
        };
        let text = format_copy(&copy);
        assert!(text.starts_with("T\n\nB\n\n> C"));
        assert!(text.contains("  - noivas"));
        assert!(text.contains("  2. S2"));
        assert!(text.ends_with("Closing: F"));
    }
}
