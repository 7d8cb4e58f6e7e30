use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    bbox,
    cancel::CancelToken,
    content::{self, ContentLine},
    data_structures::Rectangle,
    document::{Address, Document},
    error::{PdfError, PdfResult},
    handlers::structure::{allocate_parent_tree_key, parent_tree_append, struct_tree_root_number},
    handlers::NodeIndex,
    instructions::ContentTagInstruction,
    objects::{Dictionary, Object, Reference},
    page::{self, Page},
};

/// Splices `/P <</MCID n>> BDC … EMC` brackets around the operators each
/// instruction's bbox resolves to, and wires the MCIDs into the parent
/// tree.
///
/// Entries resolving to no operator are skipped silently; entries whose
/// operators were all claimed by earlier entries allocate no MCID, so no
/// dangling parent-tree slots are produced
#[derive(Debug, Default)]
pub struct ContentTaggingHandler;

impl ContentTaggingHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        entries: &[ContentTagInstruction],
        index: &NodeIndex,
        cancel: &CancelToken,
    ) -> PdfResult<()> {
        let mut by_page: BTreeMap<usize, Vec<&ContentTagInstruction>> = BTreeMap::new();
        for entry in entries {
            by_page.entry(entry.page).or_default().push(entry);
        }

        for (page_number, entries) in by_page {
            cancel.check()?;
            let page = page::page_at(doc, page_number)?;
            apply_page(doc, &page, &entries, index)?;
        }

        Ok(())
    }
}

fn apply_page(
    doc: &mut Document,
    page: &Page,
    entries: &[&ContentTagInstruction],
    index: &NodeIndex,
) -> PdfResult<()> {
    // one MCID per entry with uncovered operators; earlier entries win
    // contested operator indices
    let mut mcid_by_operator: HashMap<usize, i64> = HashMap::new();
    let mut owners: Vec<(i64, Reference)> = Vec::new();
    let mut next_mcid = 0i64;

    for entry in entries {
        let owner = index.get(&entry.node)?;

        let target = Rectangle::from_origin_size(
            entry.bbox.x,
            entry.bbox.y,
            entry.bbox.width,
            entry.bbox.height,
        );
        let resolved = bbox::resolve_rect(doc, page, &target)?;

        if resolved.is_empty() {
            debug!(
                "tag entry for node {:?} matched nothing on page {}",
                entry.node,
                page.number()
            );
            continue;
        }

        let fresh: Vec<usize> = resolved
            .into_iter()
            .filter(|idx| !mcid_by_operator.contains_key(idx))
            .collect();
        if fresh.is_empty() {
            continue;
        }

        let mcid = next_mcid;
        next_mcid += 1;

        for idx in fresh {
            mcid_by_operator.insert(idx, mcid);
        }
        owners.push((mcid, owner));
    }

    if owners.is_empty() {
        return Ok(());
    }

    let bytes = page::content_bytes(doc, page)?;
    let lines = content::lex_lines(&bytes);
    let rewritten = splice_brackets(&lines, &mcid_by_operator, &bracket_for_mcid);

    // marked-content references back from the tree into the page
    for (mcid, owner) in &owners {
        let mcr = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("MCR")),
            ("Pg", Object::Reference(Reference::new(page.object_number))),
            ("MCID", Object::Integer(*mcid)),
        ])));

        doc.object_mut(owner.object_number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| {
                PdfError::internal(format!(
                    "structure element {} vanished",
                    owner.object_number
                ))
            })?
            .push_to_array("K", Object::Reference(mcr));
    }

    let root_number = struct_tree_root_number(doc)?;
    let key = allocate_parent_tree_key(doc, root_number)?;

    let addr = Address::new(page.object_number);
    doc.dict_at_mut(&addr)?
        .insert("StructParents", Object::Integer(key));

    let max_mcid = owners.iter().map(|(mcid, _)| *mcid).max().unwrap_or(0);
    let mut parents = vec![Object::Null; max_mcid as usize + 1];
    for (mcid, owner) in &owners {
        parents[*mcid as usize] = Object::Reference(*owner);
    }
    parent_tree_append(doc, root_number, key, Object::Array(parents))?;

    page::set_content(doc, page, rewritten)
}

fn bracket_for_mcid(mcid: i64) -> String {
    format!("/P <</MCID {}>> BDC", mcid)
}

/// Rewrites a lexed stream, bracketing the operators listed in
/// `mcid_by_operator`. Brackets never straddle BT/ET; pass-through lines
/// and untagged operators close any open bracket; adjacent operators with
/// the same MCID share one bracket
pub(crate) fn splice_brackets(
    lines: &[ContentLine],
    mcid_by_operator: &HashMap<usize, i64>,
    bracket: &dyn Fn(i64) -> String,
) -> Vec<u8> {
    let mut out: Vec<ContentLine> = Vec::with_capacity(lines.len() + mcid_by_operator.len() * 2);
    let mut open: Option<i64> = None;

    let emit = |text: String, out: &mut Vec<ContentLine>| {
        out.push(ContentLine {
            text,
            operator_index: None,
        });
    };

    for line in lines {
        let tagged = line
            .operator_index
            .and_then(|idx| mcid_by_operator.get(&idx).copied());
        let trimmed = line.text.trim();

        match (tagged, trimmed) {
            (Some(mcid), _) => {
                if open.is_some() && open != Some(mcid) {
                    emit("EMC".to_owned(), &mut out);
                    open = None;
                }
                if open != Some(mcid) {
                    emit(bracket(mcid), &mut out);
                    open = Some(mcid);
                }
                out.push(line.clone());
            }
            (None, "ET") => {
                if open.take().is_some() {
                    emit("EMC".to_owned(), &mut out);
                }
                out.push(line.clone());
            }
            (None, "BT") => out.push(line.clone()),
            (None, _) => {
                if open.take().is_some() {
                    emit("EMC".to_owned(), &mut out);
                }
                out.push(line.clone());
            }
        }
    }

    if open.is_some() {
        out.push(ContentLine {
            text: "EMC".to_owned(),
            operator_index: None,
        });
    }

    content::join_lines(&out)
}
