//! Presentation: turns roster state and session reply content into
//! outbound message payloads. Pure data in, pure data out.

use crate::dispatch::InteractionKind;
use crate::gateway::{Component, Embed, OutgoingMessage, SelectOption};
use crate::ids::UserId;
use crate::ratings::RatingRecord;
use crate::roster::{GuildRoster, Position, StyleTier};
use crate::session::effect::ReplyContent;
use crate::session::state::ScoreField;

pub const ROSTER_COLOR: u32 = 0x5865F2;
pub const SUMMARY_COLOR: u32 = 0xF2C744;
pub const RECORDED_COLOR: u32 = 0x00AE86;

/// Mean of one score field across records, formatted to one decimal place.
fn average(records: &[RatingRecord], field: impl Fn(&RatingRecord) -> u8) -> String {
    let sum: u32 = records.iter().map(|r| u32::from(field(r))).sum();
    format!("{:.1}", f64::from(sum) / records.len() as f64)
}

fn score_options() -> Vec<SelectOption> {
    (1..=10)
        .map(|n| SelectOption {
            label: n.to_string(),
            value: n.to_string(),
        })
        .collect()
}

/// One line per position, in canonical order.
fn roster_lines(roster: &GuildRoster) -> String {
    Position::ALL
        .iter()
        .map(|position| match roster.holder(*position) {
            None => format!("**{position}**: vacant"),
            Some(occupant) => {
                let style = roster
                    .style_of(occupant)
                    .map(|tier| tier.label())
                    .unwrap_or_else(|| "unchosen".to_string());
                match roster.name_of(occupant) {
                    Some(name) => {
                        format!("**{position}**: {} ({style} - {name})", occupant.mention())
                    }
                    None => format!("**{position}**: {} ({style})", occupant.mention()),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The interactive roster message: embed plus the component rows driving
/// every flow.
pub fn roster_message(roster: &GuildRoster) -> OutgoingMessage {
    OutgoingMessage {
        content: None,
        embed: Some(Embed {
            title: "Team Roster".to_string(),
            description: roster_lines(roster),
            color: ROSTER_COLOR,
        }),
        components: vec![
            Component::Select {
                custom_id: InteractionKind::PositionSelect.custom_id(),
                placeholder: "Claim a position".to_string(),
                options: Position::ALL
                    .iter()
                    .map(|p| SelectOption {
                        label: p.as_str().to_string(),
                        value: p.as_str().to_string(),
                    })
                    .collect(),
            },
            Component::Select {
                custom_id: InteractionKind::StyleSelect.custom_id(),
                placeholder: "Choose a play style".to_string(),
                options: StyleTier::ALL
                    .iter()
                    .map(|tier| SelectOption {
                        label: tier.label(),
                        value: tier.key().to_string(),
                    })
                    .collect(),
            },
            Component::Button {
                custom_id: InteractionKind::MainRateOrView.custom_id(),
                label: "Rate or view players".to_string(),
            },
            Component::Button {
                custom_id: InteractionKind::LeavePosition.custom_id(),
                label: "Leave the roster".to_string(),
            },
            Component::Button {
                custom_id: InteractionKind::RemovePlayer.custom_id(),
                label: "Remove a player".to_string(),
            },
        ],
    }
}

/// The character sub-choice menu for a chosen tier.
pub fn character_menu(tier: StyleTier) -> OutgoingMessage {
    OutgoingMessage {
        content: Some(format!("Pick your {} character:", tier.label())),
        embed: None,
        components: vec![Component::Select {
            custom_id: InteractionKind::CharacterSelect(tier).custom_id(),
            placeholder: "Choose a character".to_string(),
            options: tier
                .characters()
                .iter()
                .map(|c| SelectOption {
                    label: (*c).to_string(),
                    value: (*c).to_string(),
                })
                .collect(),
        }],
    }
}

/// The subject menu: every occupied position, labeled position + name (or
/// id), with a "(you)" marker for the viewer's own entry.
pub fn subject_menu(roster: &GuildRoster, viewer: &UserId) -> OutgoingMessage {
    let options = roster
        .members()
        .into_iter()
        .map(|(position, occupant)| {
            let who = roster
                .name_of(&occupant)
                .map(str::to_string)
                .unwrap_or_else(|| occupant.to_string());
            let marker = if &occupant == viewer { " (you)" } else { "" };
            SelectOption {
                label: format!("{position} - {who}{marker}"),
                value: occupant.0.clone(),
            }
        })
        .collect();
    OutgoingMessage {
        content: Some("Pick a player:".to_string()),
        embed: None,
        components: vec![Component::Select {
            custom_id: InteractionKind::ChooseSubject.custom_id(),
            placeholder: "Choose a player".to_string(),
            options,
        }],
    }
}

/// The position menu offered to a privileged remover.
pub fn remove_menu(roster: &GuildRoster) -> OutgoingMessage {
    let options = roster
        .members()
        .into_iter()
        .map(|(position, occupant)| SelectOption {
            label: format!("{position} - {occupant}"),
            value: position.as_str().to_string(),
        })
        .collect();
    OutgoingMessage {
        content: Some("Pick a position to clear:".to_string()),
        embed: None,
        components: vec![Component::Select {
            custom_id: InteractionKind::RemoveSelect.custom_id(),
            placeholder: "Choose a position".to_string(),
            options,
        }],
    }
}

/// Render a session reply into a payload.
pub fn reply(content: &ReplyContent) -> OutgoingMessage {
    match content {
        ReplyContent::ChooseAction {
            subject,
            offer_rate,
        } => {
            let mut components = vec![Component::Button {
                custom_id: InteractionKind::ChooseView.custom_id(),
                label: "View ratings".to_string(),
            }];
            if *offer_rate {
                components.push(Component::Button {
                    custom_id: InteractionKind::ChooseRate.custom_id(),
                    label: "Rate player".to_string(),
                });
            }
            OutgoingMessage {
                content: Some(format!(
                    "What do you want to do with {}?",
                    subject.mention()
                )),
                embed: None,
                components,
            }
        }
        ReplyContent::MissingPendingSelection => {
            OutgoingMessage::text("Select a player first.")
        }
        ReplyContent::SelfRating => OutgoingMessage::text("You cannot rate yourself."),
        ReplyContent::PermissionDenied => {
            OutgoingMessage::text("You do not have permission to do that.")
        }
        ReplyContent::CooldownActive {
            retry_after_minutes,
        } => OutgoingMessage::text(format!(
            "You already rated this player recently. Try again in {retry_after_minutes} minute(s)."
        )),
        ReplyContent::RatingForm { subject } => OutgoingMessage {
            content: Some(format!(
                "Rate {} from 1 to 10 in each category:",
                subject.mention()
            )),
            embed: None,
            components: ScoreField::ALL
                .iter()
                .map(|field| Component::Select {
                    custom_id: InteractionKind::Score(*field).custom_id(),
                    placeholder: field.label().to_string(),
                    options: score_options(),
                })
                .collect(),
        },
        ReplyContent::ScoresComplete { subject } => OutgoingMessage::text(format!(
            "All scores captured for {}. Send a comment in this channel within 60 seconds, \
             or the rating will be recorded without one.",
            subject.mention()
        )),
        ReplyContent::NoRatingsYet { subject } => {
            OutgoingMessage::text(format!("No ratings yet for {}.", subject.mention()))
        }
        ReplyContent::RatingSummary { subject, records } => {
            let mut description = format!(
                "{}\nShot: {}\nAssist: {}\nDefense: {}\nGoalkeeping: {}",
                subject.mention(),
                average(records, |r| r.shot),
                average(records, |r| r.assist),
                average(records, |r| r.defense),
                average(records, |r| r.goalkeeping),
            );
            for record in records {
                description.push_str(&format!(
                    "\n> \"{}\" — {}",
                    record.comment,
                    record.rater.mention()
                ));
            }
            OutgoingMessage {
                content: None,
                embed: Some(Embed {
                    title: "Player ratings".to_string(),
                    description,
                    color: SUMMARY_COLOR,
                }),
                components: vec![],
            }
        }
        ReplyContent::RatingRecorded { rating, id } => OutgoingMessage {
            content: None,
            embed: Some(Embed {
                title: "Rating recorded".to_string(),
                description: format!(
                    "{} rated {}: shot {}, assist {}, defense {}, goalkeeping {}.\n> \"{}\" (#{id})",
                    rating.rater.mention(),
                    rating.subject.mention(),
                    rating.shot,
                    rating.assist,
                    rating.defense,
                    rating.goalkeeping,
                    rating.comment,
                ),
                color: RECORDED_COLOR,
            }),
            components: vec![],
        },
        ReplyContent::StoreUnavailable => OutgoingMessage::text(
            "Something went wrong talking to the rating store. Please try again later.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::GuildId;
    use crate::roster::RosterManager;

    fn record(shot: u8, assist: u8, defense: u8, goalkeeping: u8) -> RatingRecord {
        RatingRecord {
            id: 1,
            subject: UserId::from("a"),
            rater: UserId::from("b"),
            shot,
            assist,
            defense,
            goalkeeping,
            comment: "solid".to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_average_formats_to_one_decimal() {
        let records = vec![record(4, 1, 1, 1), record(8, 2, 2, 2)];
        assert_eq!(average(&records, |r| r.shot), "6.0");
        assert_eq!(average(&records, |r| r.assist), "1.5");
    }

    #[test]
    fn test_summary_lists_comments_with_rater() {
        let message = reply(&ReplyContent::RatingSummary {
            subject: UserId::from("a"),
            records: vec![record(7, 5, 3, 1)],
        });
        let embed = message.embed.unwrap();
        assert!(embed.description.contains("Shot: 7.0"));
        assert!(embed.description.contains("Goalkeeping: 1.0"));
        assert!(embed.description.contains("> \"solid\" — <@b>"));
        assert_eq!(embed.color, SUMMARY_COLOR);
    }

    #[tokio::test]
    async fn test_roster_lines_canonical_order_and_vacancy() {
        let manager = RosterManager::new();
        let guild = GuildId::from("g");
        let user = UserId::from("u1");
        manager.claim(&guild, &user, Position::Cm).await.unwrap();
        manager.set_style(&guild, &user, StyleTier::Mythic).await;
        manager.set_name(&guild, &user, "nagi").await;
        let roster = manager.snapshot(&guild).await;

        let lines = roster_lines(&roster);
        let rendered: Vec<&str> = lines.lines().collect();
        assert_eq!(rendered.len(), 5);
        assert_eq!(rendered[0], "**CF**: vacant");
        assert_eq!(rendered[3], "**CM**: <@u1> (MYTHIC - Nagi)");
    }

    #[tokio::test]
    async fn test_roster_line_style_unchosen() {
        let manager = RosterManager::new();
        let guild = GuildId::from("g");
        manager
            .claim(&guild, &UserId::from("u1"), Position::Gk)
            .await
            .unwrap();
        let roster = manager.snapshot(&guild).await;
        assert!(roster_lines(&roster).contains("**GK**: <@u1> (unchosen)"));
    }

    #[tokio::test]
    async fn test_subject_menu_marks_viewer() {
        let manager = RosterManager::new();
        let guild = GuildId::from("g");
        manager
            .claim(&guild, &UserId::from("u1"), Position::Cf)
            .await
            .unwrap();
        manager.set_name(&guild, &UserId::from("u1"), "nagi").await;
        let roster = manager.snapshot(&guild).await;

        let message = subject_menu(&roster, &UserId::from("u1"));
        let Component::Select { options, .. } = &message.components[0] else {
            panic!("expected select");
        };
        assert_eq!(options[0].label, "CF - Nagi (you)");
        assert_eq!(options[0].value, "u1");
    }

    #[test]
    fn test_choose_action_omits_rate_when_not_offered() {
        let message = reply(&ReplyContent::ChooseAction {
            subject: UserId::from("a"),
            offer_rate: false,
        });
        assert_eq!(message.components.len(), 1);
        let message = reply(&ReplyContent::ChooseAction {
            subject: UserId::from("a"),
            offer_rate: true,
        });
        assert_eq!(message.components.len(), 2);
    }

    #[test]
    fn test_rating_form_has_four_selectors() {
        let message = reply(&ReplyContent::RatingForm {
            subject: UserId::from("a"),
        });
        assert_eq!(message.components.len(), 4);
        for component in &message.components {
            let Component::Select { options, .. } = component else {
                panic!("expected select");
            };
            assert_eq!(options.len(), 10);
        }
    }
}
