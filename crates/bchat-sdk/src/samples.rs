//! Demo seed set of contract postings.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::contract::{
    Acceptance, Contract, ContractTerms, ContractType, Creator, Currency, DisputeResolution,
    NewContract, Priority, Reward,
};
use crate::registry::{ContractRegistry, generate_contract_id};
use crate::state::ContractStatus;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct Sample {
    fields: NewContract,
    status: ContractStatus,
    /// (assignee, external handle, claimed days ago, estimated days)
    accepted: Option<(&'static str, &'static str, i64, u32)>,
}

fn samples() -> Vec<Sample> {
    vec![
        Sample {
            fields: NewContract {
                contract_type: ContractType::ChatCreation,
                title: "Create \"Bitcoin Ordinals Trading\" Chat Room".into(),
                description: "Create and establish a high-quality chat room focused on \
                              Bitcoin Ordinals trading."
                    .into(),
                requirements: strings(&[
                    "Experience with Bitcoin Ordinals and NFT trading",
                    "History of successful community management",
                    "Available for at least 4 hours daily for first month",
                ]),
                deliverables: strings(&[
                    "Fully configured chat room with rules and guidelines",
                    "Initial 50+ quality members recruited",
                    "Daily moderation for first 30 days",
                ]),
                reward: Some(Reward::new(0.05, Currency::Bsv).with_display("0.05 BSV (~$2.50)")),
                estimated_hours: 40,
                duration: 30,
                priority: Priority::High,
                skills: strings(&["Community Management", "Bitcoin Ordinals", "Moderation"]),
                category: "Chat Creation".into(),
                created_by: Creator {
                    handle: "$ordinals_investor".into(),
                    rooms_owned: None,
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::Arbitration,
                    quality_standards: strings(&["Minimum 50 active members within 30 days"]),
                    success_metrics: strings(&["50+ members recruited", "10+ daily active users"]),
                },
            },
            status: ContractStatus::Available,
            accepted: None,
        },
        Sample {
            fields: NewContract {
                contract_type: ContractType::Moderation,
                title: "Professional Moderation for Developer Chat".into(),
                description: "Technical moderator for an active developer chat during US \
                              business hours."
                    .into(),
                requirements: strings(&[
                    "Programming experience",
                    "Available Monday-Friday 9 AM - 5 PM PST",
                ]),
                deliverables: strings(&[
                    "Daily active moderation during business hours",
                    "Weekly community engagement reports",
                ]),
                reward: Some(
                    Reward::new(15_000.0, Currency::Bchat).with_display("15,000 $BCHAT (~$67.50)"),
                ),
                estimated_hours: 160,
                duration: 30,
                priority: Priority::High,
                skills: strings(&["Programming", "Technical Moderation"]),
                category: "Moderation".into(),
                created_by: Creator {
                    handle: "$bsv_devs".into(),
                    rooms_owned: Some(strings(&["BSV Developers", "Smart Contracts"])),
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::CommunityVote,
                    quality_standards: strings(&["Response time under 30 minutes"]),
                    success_metrics: strings(&["95%+ positive community feedback"]),
                },
            },
            status: ContractStatus::Available,
            accepted: None,
        },
        Sample {
            fields: NewContract {
                contract_type: ContractType::CommunityBuilding,
                title: "Grow \"Women in Crypto\" Community to 500 Members".into(),
                description: "Grow a women-focused crypto chat from 50 to 500 active members."
                    .into(),
                requirements: strings(&["Proven track record of community growth"]),
                deliverables: strings(&[
                    "Growth from 50 to 500 members within 60 days",
                    "Weekly events and AMAs organized",
                ]),
                reward: Some(Reward::new(0.1, Currency::Bsv).with_display("0.1 BSV (~$5.00)")),
                estimated_hours: 80,
                duration: 60,
                priority: Priority::Medium,
                skills: strings(&["Community Building", "Event Planning"]),
                category: "Community Growth".into(),
                created_by: Creator {
                    handle: "$crypto_women".into(),
                    rooms_owned: None,
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::Arbitration,
                    quality_standards: strings(&["Minimum 450 members (90% of target)"]),
                    success_metrics: strings(&["500+ active members"]),
                },
            },
            status: ContractStatus::Available,
            accepted: None,
        },
        Sample {
            fields: NewContract {
                contract_type: ContractType::ContentCreation,
                title: "Create Trading Education Content Series".into(),
                description: "Educational content for a Bitcoin trading chat, from basics to \
                              advanced strategies."
                    .into(),
                requirements: strings(&["Proven Bitcoin trading track record (2+ years)"]),
                deliverables: strings(&[
                    "10-part educational series covering trading fundamentals",
                    "Weekly market analysis posts",
                ]),
                reward: Some(
                    Reward::new(25_000.0, Currency::Bchat)
                        .with_display("25,000 $BCHAT (~$112.50)"),
                ),
                estimated_hours: 60,
                duration: 45,
                priority: Priority::Medium,
                skills: strings(&["Technical Analysis", "Content Creation"]),
                category: "Content Creation".into(),
                created_by: Creator {
                    handle: "$trade_master".into(),
                    rooms_owned: None,
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::CommunityVote,
                    quality_standards: strings(&["Accurate market information"]),
                    success_metrics: strings(&["10+ educational posts completed"]),
                },
            },
            status: ContractStatus::Claimed,
            accepted: Some(("$crypto_educator", "crypto-educator", 5, 45)),
        },
        Sample {
            fields: NewContract {
                contract_type: ContractType::Technical,
                title: "Integrate 1Sat Ordinals API into Chat Platform".into(),
                description: "Display NFT collections in chat with real-time marketplace data."
                    .into(),
                requirements: strings(&[
                    "Full-stack development experience",
                    "Experience with APIs and real-time data",
                ]),
                deliverables: strings(&[
                    "API integration with 1Sat Ordinals marketplace",
                    "Real-time NFT price feeds in chat",
                ]),
                reward: Some(Reward::new(0.08, Currency::Bsv).with_display("0.08 BSV (~$4.00)")),
                estimated_hours: 32,
                duration: 14,
                priority: Priority::High,
                skills: strings(&["API Integration", "Real-time Data"]),
                category: "Technical Development".into(),
                created_by: Creator {
                    handle: "$nft_chat_admin".into(),
                    rooms_owned: None,
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::PlatformDecision,
                    quality_standards: strings(&["Code quality and documentation"]),
                    success_metrics: strings(&["Full API integration working"]),
                },
            },
            status: ContractStatus::Available,
            accepted: None,
        },
        Sample {
            fields: NewContract {
                contract_type: ContractType::Moderation,
                title: "Moderate High-Volume Trading Chat (24/7)".into(),
                description: "Team moderation for a trading chat with 500+ daily messages."
                    .into(),
                requirements: strings(&["Previous trading chat moderation experience"]),
                deliverables: strings(&[
                    "24/7 moderation coverage (team-based)",
                    "Daily moderation reports",
                ]),
                reward: Some(Reward::new(0.12, Currency::Bsv).with_display("0.12 BSV (~$6.00)")),
                estimated_hours: 240,
                duration: 30,
                priority: Priority::Critical,
                skills: strings(&["High-Volume Moderation", "Spam Detection"]),
                category: "Moderation".into(),
                created_by: Creator {
                    handle: "$trading_central".into(),
                    rooms_owned: None,
                },
                contract_terms: ContractTerms {
                    escrow_required: true,
                    dispute_resolution: DisputeResolution::Arbitration,
                    quality_standards: strings(&["Response time under 5 minutes"]),
                    success_metrics: strings(&["99%+ uptime coverage"]),
                },
            },
            status: ContractStatus::InProgress,
            accepted: Some(("$mod_team_lead", "mod-team-lead", 10, 30)),
        },
    ]
}

/// The demo postings, created at random points during the week before
/// `now`, or during the week before their claim when already accepted.
pub fn sample_contracts(now: DateTime<Utc>) -> Vec<Contract> {
    let mut rng = rand::thread_rng();
    samples()
        .into_iter()
        .filter_map(|sample| {
            let claimed_at = sample.accepted.map(|(_, _, ago, _)| now - Duration::days(ago));
            let created_at = claimed_at.unwrap_or(now)
                - Duration::milliseconds(rng.gen_range(0..7 * 86_400_000));
            let id = generate_contract_id("sample", now);
            let build = || -> crate::Result<Contract> {
                let mut contract = sample.fields.into_contract(id, created_at)?;
                contract.status = sample.status;
                contract.last_updated = now;
                if let (Some((handle, external, _, days)), Some(claimed_at)) =
                    (sample.accepted, claimed_at)
                {
                    contract.accepted_by = Some(Acceptance::new(
                        handle.to_string(),
                        Some(external.to_string()),
                        claimed_at,
                        days,
                    )?);
                }
                Ok(contract)
            };
            match build() {
                Ok(contract) => Some(contract),
                Err(e) => {
                    log::warn!("skipping invalid sample contract: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Seed `registry` with [`sample_contracts`]. Returns the number inserted.
pub fn seed_registry(registry: &ContractRegistry, now: DateTime<Utc>) -> usize {
    let contracts = sample_contracts(now);
    let count = contracts.len();
    for contract in contracts {
        registry.insert_contract(contract);
    }
    log::info!("seeded {count} sample contracts");
    count
}
