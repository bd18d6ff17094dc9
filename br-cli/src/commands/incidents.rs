//! Incident commands.

use clap::{Args, Subcommand};
use console::style;

use br_core::config::ConfigHandle;
use br_core::error::{BrError, BrResult};
use br_models::queries::{IncidentFilter, IncidentWithDetails};
use br_models::IncidentState;
use br_services::{AppContext, IncidentInput, TakeOutcome};

use crate::{Credentials, OutputFormat};

#[derive(Subcommand)]
pub enum IncidentsAction {
    /// List incidents, newest first.
    List {
        /// Only incidents in this state (created, assigned, closed).
        #[arg(short, long)]
        state: Option<IncidentState>,
        /// Only incidents assigned to you.
        #[arg(short, long)]
        mine: bool,
        /// Maximum rows to show.
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show one incident.
    Show {
        id: i64,
    },
    /// Report a new incident.
    Create {
        #[command(flatten)]
        fields: IncidentFields,
    },
    /// Edit an open incident. Omitted fields keep their value.
    Edit {
        id: i64,
        #[command(flatten)]
        fields: IncidentFields,
    },
    /// Take an incident yourself.
    Take {
        id: i64,
    },
    /// Assign an incident to another user (administrators).
    Assign {
        id: i64,
        /// Id of the assignee.
        #[arg(long)]
        to: i64,
    },
    /// Close an assigned incident.
    Close {
        id: i64,
    },
    /// Incident counts per state.
    Stats,
}

#[derive(Args, Debug, Default)]
pub struct IncidentFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    detail: Option<String>,
    #[arg(long)]
    latitude: Option<String>,
    #[arg(long)]
    longitude: Option<String>,
    #[arg(long)]
    comuna: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// Image file path, file:// URI or http(s) URL.
    #[arg(long)]
    photo: Option<String>,
}

impl IncidentFields {
    /// Overlay the given flags on `base`.
    fn apply_to(self, mut base: IncidentInput) -> IncidentInput {
        let overlay = |slot: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *slot = value;
            }
        };
        overlay(&mut base.title, self.title);
        overlay(&mut base.detail, self.detail);
        overlay(&mut base.latitude, self.latitude);
        overlay(&mut base.longitude, self.longitude);
        overlay(&mut base.comuna, self.comuna);
        overlay(&mut base.region, self.region);
        overlay(&mut base.address, self.address);
        base.photo = self.photo;
        base
    }
}

pub async fn run(
    config: ConfigHandle,
    credentials: Credentials,
    action: IncidentsAction,
    format: OutputFormat,
) -> BrResult<()> {
    let (ctx, events) = super::open_context(&config).await?;
    let result = dispatch(&ctx, &credentials, action, format);
    super::close_context(ctx, events).await;
    result
}

fn dispatch(ctx: &AppContext, credentials: &Credentials, action: IncidentsAction, format: OutputFormat) -> BrResult<()> {
    match action {
        IncidentsAction::List { state, mine, limit } => {
            let mut filter = IncidentFilter {
                state,
                ..IncidentFilter::default()
            };
            if mine {
                let user = super::authenticate(ctx, credentials)?;
                filter.assigned_to = Some(user.user_id);
            }
            let mut incidents = ctx.incidents.list(&filter)?;
            incidents.truncate(limit);
            print_list(&incidents, format);
        }
        IncidentsAction::Show { id } => {
            let incident = ctx.incidents.find(id)?;
            print_detail(&incident, format);
        }
        IncidentsAction::Create { fields } => {
            let user = super::authenticate(ctx, credentials)?;
            let input = fields.apply_to(IncidentInput::default());
            let incident = ctx.incidents.insert_incident(&input, Some(user.user_id))?;
            let id = incident.id.unwrap_or_default();
            match format {
                OutputFormat::Json => print_detail(&ctx.incidents.find(id)?, format),
                OutputFormat::Text => super::success(&format!("incident {id} reported")),
            }
        }
        IncidentsAction::Edit { id, fields } => {
            super::authenticate(ctx, credentials)?;
            let current = ctx.incidents.find(id)?;
            let input = fields.apply_to(IncidentInput::from(&current.incident));
            ctx.incidents.update_incident(id, &input)?;
            match format {
                OutputFormat::Json => print_detail(&ctx.incidents.find(id)?, format),
                OutputFormat::Text => super::success(&format!("incident {id} updated")),
            }
        }
        IncidentsAction::Take { id } => {
            let user = super::authenticate(ctx, credentials)?;
            let outcome = ctx.incidents.take_incident(id, user.user_id)?;
            print_take(id, &outcome, format);
        }
        IncidentsAction::Assign { id, to } => {
            let user = super::authenticate(ctx, credentials)?;
            if !user.is_admin() {
                return Err(BrError::validation("role", "only administrators can assign incidents"));
            }
            let incident = ctx.incidents.assign_incident(id, to)?.into_result(id)?;
            print_take(id, &TakeOutcome::Taken(incident), format);
        }
        IncidentsAction::Close { id } => {
            super::authenticate(ctx, credentials)?;
            let incident = ctx.incidents.close_incident(id)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&incident)?),
                OutputFormat::Text => super::success(&format!("incident {id} closed")),
            }
        }
        IncidentsAction::Stats => {
            let counts = ctx.incidents.count_by_state()?;
            match format {
                OutputFormat::Json => {
                    let map: serde_json::Map<String, serde_json::Value> = counts
                        .iter()
                        .map(|(state, count)| (state.to_string(), serde_json::Value::from(*count)))
                        .collect();
                    super::print_json(&serde_json::Value::Object(map));
                }
                OutputFormat::Text => {
                    let mut table = super::new_table(vec!["State", "Incidents"]);
                    for (state, count) in &counts {
                        table.add_row(vec![styled_state(*state), count.to_string()]);
                    }
                    println!("{table}");
                }
            }
        }
    }
    Ok(())
}

fn styled_state(state: IncidentState) -> String {
    match state {
        IncidentState::Created => style(state).yellow().to_string(),
        IncidentState::Assigned => style(state).cyan().to_string(),
        IncidentState::Closed => style(state).dim().to_string(),
    }
}

fn print_list(incidents: &[IncidentWithDetails], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            super::print_json(&serde_json::to_value(incidents).unwrap_or_default());
        }
        OutputFormat::Text => {
            if incidents.is_empty() {
                println!("No incidents.");
                return;
            }
            let mut table = super::new_table(vec!["ID", "Title", "State", "Comuna", "Assigned to", "Reported"]);
            for row in incidents {
                let incident = &row.incident;
                table.add_row(vec![
                    incident.id.unwrap_or_default().to_string(),
                    super::truncate(&incident.title, 30),
                    styled_state(incident.state),
                    incident.comuna.clone().unwrap_or_default(),
                    row.assignee_name.clone().unwrap_or_else(|| "-".to_string()),
                    super::format_millis(incident.created_at),
                ]);
            }
            println!("{table}");
            println!("{} incident(s)", incidents.len());
        }
    }
}

fn print_detail(row: &IncidentWithDetails, format: OutputFormat) {
    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(row).unwrap_or_default()),
        OutputFormat::Text => {
            let incident = &row.incident;
            let dash = || "-".to_string();
            println!(
                "{} {}",
                style(format!("#{}", incident.id.unwrap_or_default())).dim(),
                style(&incident.title).bold()
            );
            println!("  State:     {}", styled_state(incident.state));
            println!("  Reported:  {}", super::format_millis(incident.created_at));
            println!("  Reporter:  {}", row.reporter_name.clone().unwrap_or_else(dash));
            println!("  Assignee:  {}", row.assignee_name.clone().unwrap_or_else(dash));
            println!("  Address:   {}", incident.address.clone().unwrap_or_else(dash));
            println!(
                "  Comuna:    {} {}",
                incident.comuna.clone().unwrap_or_else(dash),
                incident.region.as_deref().map(|r| format!("({r})")).unwrap_or_default()
            );
            if let (Some(lat), Some(lon)) = (incident.latitude, incident.longitude) {
                println!("  Location:  {lat}, {lon}");
            }
            if let Some(url) = &row.photo_url {
                println!("  Photo:     {}", style(url).dim());
            }
            println!();
            println!("{}", incident.detail);
        }
    }
}

fn print_take(id: i64, outcome: &TakeOutcome, format: OutputFormat) {
    match (outcome, format) {
        (TakeOutcome::Taken(incident), OutputFormat::Json) => super::print_json(&serde_json::json!({
            "taken": true,
            "assigned_to": incident.assigned_to,
        })),
        (TakeOutcome::AlreadyTaken { assigned_to }, OutputFormat::Json) => super::print_json(&serde_json::json!({
            "taken": false,
            "assigned_to": assigned_to,
        })),
        (TakeOutcome::Taken(incident), OutputFormat::Text) => super::success(&format!(
            "incident {id} assigned to user {}",
            incident.assigned_to.unwrap_or_default()
        )),
        (TakeOutcome::AlreadyTaken { assigned_to }, OutputFormat::Text) => println!(
            "{} incident {id} was already taken by user {assigned_to}",
            style("!").yellow().bold()
        ),
    }
}
