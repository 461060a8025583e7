//! Tribe, squad and approver cascade

use anyhow::{bail, Result};
use serde_json::json;
use tabled::Tabled;
use tracing::info;

use super::AppContext;
use crate::output::{
    print_info, print_json, print_success, print_table, print_warning, OutputFormat,
};
use capacity_core::org::{APPROVER_FIELD, SQUAD_FIELD, TRIBE_FIELD};
use capacity_core::tags;

#[derive(Tabled)]
struct TribeRow {
    #[tabled(rename = "Tribe")]
    tribe: String,
    #[tabled(rename = "Squads")]
    squads: String,
    #[tabled(rename = "Approver")]
    approver: String,
}

pub fn tribes(ctx: &AppContext) -> Result<()> {
    let directory = ctx.directory();
    info!(source = directory.source().label(), "Organization directory");

    match ctx.format {
        OutputFormat::Json => print_json(directory.entries())?,
        OutputFormat::Table => {
            let rows: Vec<TribeRow> = directory
                .tribes()
                .into_iter()
                .map(|tribe| TribeRow {
                    tribe: tribe.to_string(),
                    squads: directory.squads(tribe).join(", "),
                    approver: directory.find_approver(tribe).to_string(),
                })
                .collect();
            print_table(&rows);
            if directory.is_builtin() {
                print_info("Showing the built-in directory");
            }
        }
    }

    Ok(())
}

fn sync_org_tags(ctx: &mut AppContext) -> Result<()> {
    for field in [TRIBE_FIELD, SQUAD_FIELD, APPROVER_FIELD] {
        tags::sync_field(&mut ctx.session.form, field)?;
    }
    Ok(())
}

/// Select a tribe: offers its squads and fills in the approver
pub fn select_tribe(ctx: &mut AppContext, tribe: &str) -> Result<()> {
    let directory = ctx.directory();
    let squads = directory.select_tribe(tribe, &mut ctx.session.form)?;
    ctx.session.squad_options = squads;
    sync_org_tags(ctx)?;
    ctx.save()?;

    match ctx.format {
        OutputFormat::Json => print_json(&json!({
            "tribe": tribe,
            "squads": ctx.session.squad_options,
            "approver": ctx.session.form.get(APPROVER_FIELD),
        }))?,
        OutputFormat::Table => {
            if ctx.session.squad_options.is_empty() {
                print_warning(&format!("No squads found for tribe '{}'", tribe));
            } else {
                print_success(&format!("Selected tribe {}", tribe));
                println!("Squads:   {}", ctx.session.squad_options.join(", "));
                println!(
                    "Approver: {}",
                    ctx.session.form.get(APPROVER_FIELD).unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

/// Select a squad of the current tribe and re-resolve the approver
pub fn select_squad(ctx: &mut AppContext, squad: &str) -> Result<()> {
    if !ctx.session.squad_options.iter().any(|option| option == squad) {
        if ctx.session.squad_options.is_empty() {
            bail!("No squads available, select a tribe first");
        }
        bail!(
            "Unknown squad '{}'. Available: {}",
            squad,
            ctx.session.squad_options.join(", ")
        );
    }

    let directory = ctx.directory();
    directory.select_squad(squad, &mut ctx.session.form)?;
    sync_org_tags(ctx)?;
    ctx.save()?;

    print_success(&format!(
        "Selected squad {} (approver: {})",
        squad,
        ctx.session.form.get(APPROVER_FIELD).unwrap_or_default()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::context;
    use std::io::Write;

    #[test]
    fn test_select_tribe_and_squad_from_builtin() {
        let (mut ctx, _dir) = context(OutputFormat::Table);

        select_tribe(&mut ctx, "funds").unwrap();
        assert_eq!(ctx.session.squad_options.len(), 3);
        assert_eq!(ctx.session.form.get("tagApprover"), Some("Abi Baltazar"));
        assert_eq!(ctx.session.form.get("tagSquad"), Some("Not specified"));

        select_squad(&mut ctx, "bank_transfer").unwrap();
        assert_eq!(ctx.session.form.get("tagSquad"), Some("bank_transfer"));
        assert_eq!(ctx.session.form.get(APPROVER_FIELD), Some("Abi Baltazar"));
    }

    #[test]
    fn test_unknown_tribe_clears_squads_keeps_approver() {
        let (mut ctx, _dir) = context(OutputFormat::Table);
        select_tribe(&mut ctx, "platform").unwrap();

        select_tribe(&mut ctx, "ghost").unwrap();
        assert!(ctx.session.squad_options.is_empty());
        assert_eq!(ctx.session.form.get(APPROVER_FIELD), Some("Platform Lead"));
        assert!(select_squad(&mut ctx, "security").is_err());
    }

    #[test]
    fn test_squad_must_belong_to_tribe() {
        let (mut ctx, _dir) = context(OutputFormat::Table);
        select_tribe(&mut ctx, "funds").unwrap();
        assert!(select_squad(&mut ctx, "monitoring").is_err());
    }

    #[test]
    fn test_configured_directory_file() {
        let (mut ctx, dir) = context(OutputFormat::Json);
        let path = dir.path().join("orgMapping.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"[{"tribes": {"lending": ["loans"]}, "approver": "Jane Cruz"}]"#)
            .unwrap();
        ctx.org_mapping = Some(path);

        select_tribe(&mut ctx, "lending").unwrap();
        assert_eq!(ctx.session.squad_options, vec!["loans"]);
        assert_eq!(ctx.session.form.get(APPROVER_FIELD), Some("Jane Cruz"));
    }
}
