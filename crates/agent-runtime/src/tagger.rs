//! Element discovery and tagging.
//!
//! A tagging pass runs in two phases so the identifier policy lives in
//! Rust where it is unit-testable:
//!
//! 1. **Scan**: one injected script clears stale overlays, collects every
//!    qualifying interactive element and scroll container that is visually
//!    present, and reports each with its scan ordinal, any persisted
//!    identifier, and its attribute bag.
//! 2. **Assign + apply**: Rust assigns identifiers (reuse persisted ones,
//!    `max+1` for novel elements), then a second script persists the ids
//!    onto the nodes and renders the visual overlays: red labels for
//!    interactive elements, blue `S:`-prefixed labels for scroll
//!    containers.
//!
//! Overlays are transient; [`remove_tags`] must run before any screenshot
//! or click that the overlay could disturb.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use cdp_driver::{DriverError, PageDriver};
use wayfinder_core_types::{ElementKind, ElementRecord, PERSIST_ATTR};

/// Transient attribute linking scan ordinals between the two phases.
const SCAN_ATTR: &str = "data-wf-scan";
/// Class carried by every overlay node.
const TAG_CLASS: &str = "wf-tag";

const INTERACTIVE_COLOR: &str = "#ff0000";
const SCROLL_COLOR: &str = "#0000ff";

/// Phase-1 script. Applies the selection and rejection rules and reports
/// candidates; assigns nothing.
pub const SCAN_SCRIPT: &str = r#"(() => {
    document.querySelectorAll('.wf-tag').forEach(el => el.remove());
    document.querySelectorAll('[data-wf-scan]').forEach(el => el.removeAttribute('data-wf-scan'));

    let maxPersisted = null;
    document.querySelectorAll('[data-wf-id]').forEach(el => {
        const id = parseInt(el.getAttribute('data-wf-id'), 10);
        if (!Number.isNaN(id) && (maxPersisted === null || id > maxPersisted)) maxPersisted = id;
    });

    const candidates = [];
    let scan = 0;
    const orNull = (s) => (s && s.trim() !== '' ? s : null);

    const consider = (el, kind) => {
        if (el.hasAttribute('data-wf-scan')) return;
        const rect = el.getBoundingClientRect();
        if (rect.width < 10 || rect.height < 10) return;
        if (window.getComputedStyle(el).visibility === 'hidden') return;
        if (rect.top < 0 && rect.bottom < 0) return;

        const cx = rect.left + rect.width / 2;
        const cy = rect.top + rect.height / 2;
        const top = document.elementFromPoint(cx, cy);
        if (top && !el.contains(top) && !top.contains(el)) return;

        const persistedRaw = el.getAttribute('data-wf-id');
        const persisted = persistedRaw === null ? null : parseInt(persistedRaw, 10);
        el.setAttribute('data-wf-scan', String(scan));

        const entry = {
            scan,
            kind,
            tag: el.tagName.toLowerCase(),
            persisted: Number.isNaN(persisted) ? null : persisted,
        };
        if (kind === 'interactive') {
            entry.text = orNull((el.innerText || '').substring(0, 50));
            entry.placeholder = orNull(el.placeholder || '');
            entry.input_type = orNull(el.getAttribute('type') || '');
            entry.value = orNull(el.value !== undefined ? String(el.value) : '');
            entry.aria_label = orNull(el.getAttribute('aria-label') || '');
            entry.title = orNull(el.getAttribute('title') || '');
            entry.role = orNull(el.getAttribute('role') || '');
        } else {
            entry.scroll_height = el.scrollHeight;
            entry.client_height = el.clientHeight;
            entry.class_name = orNull(typeof el.className === 'string' ? el.className : '');
            const children = Array.from(el.children).slice(0, 5);
            const preview = children
                .map(c => (c.innerText || '').trim())
                .filter(t => t)
                .join(', ')
                .substring(0, 100);
            entry.visible_content = orNull(preview);
        }
        candidates.push(entry);
        scan++;
    };

    document
        .querySelectorAll('button, a, input, select, textarea, [role="button"], [role="link"], [role="option"], li[role="presentation"]')
        .forEach(el => consider(el, 'interactive'));

    document.querySelectorAll('*').forEach(el => {
        const style = window.getComputedStyle(el);
        const scrollable = (style.overflowY === 'auto' || style.overflowY === 'scroll')
            && el.scrollHeight > el.clientHeight;
        if (scrollable) consider(el, 'scroll');
    });

    return { max_persisted: maxPersisted, candidates };
})()"#;

/// Script removing every overlay node. Paired with each tagging pass
/// before screenshots or actions that could collide with the overlay.
pub const REMOVE_TAGS_SCRIPT: &str =
    "document.querySelectorAll('.wf-tag').forEach(el => el.remove())";

/// One qualifying element as the scan script reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanCandidate {
    pub scan: u32,
    pub kind: String,
    pub tag: String,
    #[serde(default)]
    pub persisted: Option<u32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub scroll_height: Option<i64>,
    #[serde(default)]
    pub client_height: Option<i64>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub visible_content: Option<String>,
}

/// Scan script payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanPayload {
    #[serde(default)]
    pub max_persisted: Option<u32>,
    #[serde(default)]
    pub candidates: Vec<ScanCandidate>,
}

/// Identifier decided for one scanned candidate.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagAssignment {
    pub scan: u32,
    pub id: u32,
    pub scroll: bool,
}

/// Assign identifiers to a scan payload.
///
/// Persisted identifiers are reused so the inference service's history
/// keeps referring to the same elements; novel elements get
/// `max(existing)+1` onwards in scan order. A persisted id seen twice
/// (cloned nodes) is kept on its first occurrence only; later carriers
/// are re-issued fresh ids, keeping assignment injective within the pass.
pub fn assign_ids(payload: &ScanPayload) -> (Vec<ElementRecord>, Vec<TagAssignment>) {
    let mut next = payload.max_persisted.map(|m| m + 1).unwrap_or(0);
    let mut taken: HashSet<u32> = HashSet::new();
    let mut records = Vec::with_capacity(payload.candidates.len());
    let mut assignments = Vec::with_capacity(payload.candidates.len());

    for candidate in &payload.candidates {
        let id = match candidate.persisted {
            Some(persisted) if !taken.contains(&persisted) => persisted,
            _ => {
                while taken.contains(&next) {
                    next += 1;
                }
                let fresh = next;
                next += 1;
                fresh
            }
        };
        taken.insert(id);

        let kind = if candidate.kind == "scroll" {
            ElementKind::ScrollContainer
        } else {
            ElementKind::Interactive
        };

        let mut record = ElementRecord::new(id, kind, candidate.tag.clone());
        record.text = candidate.text.clone();
        record.placeholder = candidate.placeholder.clone();
        record.input_type = candidate.input_type.clone();
        record.value = candidate.value.clone();
        record.aria_label = candidate.aria_label.clone();
        record.title = candidate.title.clone();
        record.role = candidate.role.clone();
        record.scroll_height = candidate.scroll_height;
        record.client_height = candidate.client_height;
        record.class_name = candidate.class_name.clone();
        record.visible_content = candidate.visible_content.clone();

        assignments.push(TagAssignment {
            scan: candidate.scan,
            id,
            scroll: kind == ElementKind::ScrollContainer,
        });
        records.push(record);
    }

    (records, assignments)
}

/// Phase-2 script: persist assigned ids and render the overlays.
fn apply_script(assignments: &[TagAssignment]) -> Result<String, DriverError> {
    let assignments_json = serde_json::to_string(assignments)
        .map_err(|err| DriverError::Evaluation(err.to_string()))?;
    Ok(format!(
        r#"(() => {{
            const assignments = {assignments_json};
            for (const a of assignments) {{
                const el = document.querySelector('[{SCAN_ATTR}="' + a.scan + '"]');
                if (!el) continue;
                el.setAttribute('{PERSIST_ATTR}', String(a.id));
                const rect = el.getBoundingClientRect();
                const tag = document.createElement('div');
                tag.className = '{TAG_CLASS}';
                tag.innerText = a.scroll ? 'S:' + a.id : String(a.id);
                Object.assign(tag.style, {{
                    position: 'fixed',
                    top: Math.max(0, rect.top) + 'px',
                    left: Math.max(0, rect.left) + 'px',
                    backgroundColor: a.scroll ? '{SCROLL_COLOR}' : '{INTERACTIVE_COLOR}',
                    color: 'white',
                    padding: '2px 4px',
                    fontSize: '12px',
                    fontWeight: 'bold',
                    zIndex: '2147483647',
                    border: '1px solid white',
                    pointerEvents: 'none',
                }});
                document.body.appendChild(tag);
            }}
            document.querySelectorAll('[{SCAN_ATTR}]').forEach(el => el.removeAttribute('{SCAN_ATTR}'));
        }})()"#
    ))
}

/// Run a full tagging pass: scan, assign, persist ids, render overlays.
pub async fn tag_page(driver: &dyn PageDriver) -> Result<Vec<ElementRecord>, DriverError> {
    let raw = driver.evaluate(SCAN_SCRIPT).await?;
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let payload: ScanPayload = serde_json::from_value(raw)
        .map_err(|err| DriverError::Evaluation(format!("scan payload: {err}")))?;

    let (records, assignments) = assign_ids(&payload);
    debug!(
        elements = records.len(),
        max_persisted = ?payload.max_persisted,
        "tagging pass complete"
    );

    driver.evaluate(&apply_script(&assignments)?).await?;
    Ok(records)
}

/// Remove every overlay rendered by the last tagging pass.
pub async fn remove_tags(driver: &dyn PageDriver) {
    if let Err(err) = driver.evaluate(REMOVE_TAGS_SCRIPT).await {
        warn!(error = %err, "overlay removal failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(scan: u32, persisted: Option<u32>) -> ScanCandidate {
        serde_json::from_value(json!({
            "scan": scan,
            "kind": "interactive",
            "tag": "button",
            "persisted": persisted,
        }))
        .unwrap()
    }

    #[test]
    fn persisted_ids_are_stable_across_passes() {
        let payload = ScanPayload {
            max_persisted: None,
            candidates: vec![candidate(0, None), candidate(1, None), candidate(2, None)],
        };
        let (first, _) = assign_ids(&payload);
        let ids: Vec<u32> = first.iter().map(|r| r.id).collect();
        assert_eq!(ids, [0, 1, 2]);

        // Second pass over an unchanged DOM: every candidate now carries
        // its persisted id, so assignment must reproduce it exactly.
        let second_payload = ScanPayload {
            max_persisted: Some(2),
            candidates: ids
                .iter()
                .enumerate()
                .map(|(scan, id)| candidate(scan as u32, Some(*id)))
                .collect(),
        };
        let (second, _) = assign_ids(&second_payload);
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn novel_elements_get_next_unused_id() {
        let payload = ScanPayload {
            max_persisted: Some(7),
            candidates: vec![candidate(0, Some(3)), candidate(1, None), candidate(2, None)],
        };
        let (records, _) = assign_ids(&payload);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), [3, 8, 9]);
    }

    #[test]
    fn assignment_is_injective_within_a_pass() {
        // Duplicate persisted ids (cloned DOM nodes) must not alias.
        let payload = ScanPayload {
            max_persisted: Some(5),
            candidates: vec![
                candidate(0, Some(5)),
                candidate(1, Some(5)),
                candidate(2, Some(2)),
                candidate(3, None),
            ],
        };
        let (records, _) = assign_ids(&payload);
        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len(), "ids must be unique: {ids:?}");
        assert_eq!(ids[0], 5);
        assert_ne!(ids[1], 5);
        assert_eq!(ids[2], 2);
    }

    #[test]
    fn scroll_candidates_become_scroll_container_records() {
        let payload: ScanPayload = serde_json::from_value(json!({
            "max_persisted": null,
            "candidates": [{
                "scan": 0,
                "kind": "scroll",
                "tag": "div",
                "persisted": null,
                "scroll_height": 2400,
                "client_height": 600,
                "class_name": "sidebar",
                "visible_content": "2021, 2020, 2019",
            }]
        }))
        .unwrap();

        let (records, assignments) = assign_ids(&payload);
        assert_eq!(records[0].kind, ElementKind::ScrollContainer);
        assert_eq!(records[0].scroll_height, Some(2400));
        assert!(assignments[0].scroll);
    }

    #[test]
    fn apply_script_embeds_assignments() {
        let assignments = vec![TagAssignment {
            scan: 0,
            id: 12,
            scroll: true,
        }];
        let script = apply_script(&assignments).unwrap();
        assert!(script.contains("\"id\":12"));
        assert!(script.contains(PERSIST_ATTR));
        assert!(script.contains("S:"));
    }
}
