//! Organizational metadata form and its display tags

use anyhow::{bail, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use tabled::Tabled;

use super::AppContext;
use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};
use capacity_core::tags::{
    self, TagContext, COST_ESTIMATE_TAG, REQUEST_INFO_MAPPING, TAG_MAPPING,
};

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Form fields accepted by `meta set`
pub fn known_fields() -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = Vec::new();
    for (field, _) in TAG_MAPPING.iter().chain(REQUEST_INFO_MAPPING) {
        if !fields.contains(field) {
            fields.push(*field);
        }
    }
    fields
}

/// Set a form field and refresh the tags derived from it
pub fn set(ctx: &mut AppContext, field: &str, value: &str) -> Result<()> {
    if !known_fields().iter().any(|known| *known == field) {
        bail!(
            "Unknown metadata field '{}'. Known fields: {}",
            field,
            known_fields().join(", ")
        );
    }

    ctx.session.form.set(field, value);
    tags::sync_field_in(&mut ctx.session.form, field, TagContext::Generic)?;
    tags::sync_field_in(&mut ctx.session.form, field, TagContext::Metadata)?;
    ctx.save()?;

    print_success(&format!("Set {} = {}", field, value.trim()));
    Ok(())
}

fn tag_rows<'a>(tags: impl Iterator<Item = &'a str>, ctx: &AppContext) -> Vec<TagRow> {
    tags.map(|tag| TagRow {
        tag: tag.to_string(),
        value: ctx.session.form.get(tag).unwrap_or_default().to_string(),
    })
    .collect()
}

fn tag_section(ctx: &AppContext) -> Vec<TagRow> {
    let tags = TAG_MAPPING.iter().map(|(_, tag)| *tag);
    tag_rows(tags.chain(std::iter::once(COST_ESTIMATE_TAG)), ctx)
}

fn request_section(ctx: &AppContext) -> Vec<TagRow> {
    tag_rows(REQUEST_INFO_MAPPING.iter().map(|(_, tag)| *tag), ctx)
}

/// Refresh every tag and print them
pub fn show(ctx: &mut AppContext) -> Result<()> {
    let mut missing = tags::sync_all(
        &mut ctx.session.form,
        ctx.session.last_accepted.as_ref(),
        &ctx.session.results,
    );
    missing.extend(tags::sync_request_information(&mut ctx.session.form));
    ctx.save()?;

    match ctx.format {
        OutputFormat::Json => {
            let tags: Map<String, Value> = tag_section(ctx)
                .into_iter()
                .chain(request_section(ctx))
                .map(|row| (row.tag, Value::String(row.value)))
                .collect();
            print_json(&tags)?;
        }
        OutputFormat::Table => {
            println!("{}", "Tags".bold());
            print_table(&tag_section(ctx));
            println!();
            println!("{}", "Request Information".bold());
            print_table(&request_section(ctx));
        }
    }

    if !missing.is_empty() {
        print_warning(&format!("Not rendered: {}", missing.join(", ")));
    }
    Ok(())
}
