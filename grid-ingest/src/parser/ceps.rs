//! CEPS SOAP responses
//!
//! Every operation answers with flat `<item date=".." value1=".." .. />`
//! rows. The meaning of each anonymous `valueN` slot is fixed per dataset
//! by [`CepsDataset::slots`].

use super::xml::{self, parse_decimal};
use super::{CepsDataset, ParseContext, ParseError, ParseResult, SourceVariant};
use crate::calendar::InstantParser;
use crate::schema::{ParsedDocument, RawSample};

pub(super) fn parse(
    variant: SourceVariant,
    dataset: CepsDataset,
    text: &str,
    ctx: &ParseContext<'_>,
) -> ParseResult<ParsedDocument> {
    let doc = xml::parse_tree(text)?;
    let root = doc.root_element();

    if let Some(fault) = xml::descendants(root, "Fault").next() {
        let reason = xml::child_text(fault, "faultstring").unwrap_or("unspecified");
        return Err(ParseError::MalformedDocument(format!("SOAP fault: {}", reason)));
    }

    if xml::descendants(root, "item").next().is_none() {
        // Some deployments return the payload as an escaped string.
        let result = format!("{}Result", dataset.operation());
        if let Some(inner) = xml::descendants(root, &result)
            .next()
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|t| t.starts_with('<'))
        {
            return parse(variant, dataset, inner, ctx);
        };
    }

    let mut out = ParsedDocument::default();
    let mut instants = InstantParser::new(ctx.calendar.timezone());

    for item in xml::descendants(root, "item") {
        let Some(date) = item.attribute("date").map(str::trim).filter(|d| !d.is_empty()) else {
            out.reject(variant, None, "item without date", "item");
            continue;
        };
        let instant = instants.parse(date)?;

        for (slot, fields) in dataset.slots() {
            let Some(raw) = item.attribute(*slot).map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            match parse_decimal(raw) {
                Some(value) => {
                    for &field in fields.iter() {
                        out.push(RawSample::new(variant, field, instant, value));
                    }
                }
                None => out.reject(variant, fields.first().copied(), "non-numeric value", raw),
            }
        }
    }

    Ok(out)
}
