//! Manifest reconciliation.
//!
//! Compares a manifest file's text against the properties of a live
//! application and produces a script of byte-offset text edits that brings
//! the file in line. Edits are line-granular so hand-written comments and
//! formatting outside the touched lines survive. When the local text cannot
//! be handled structurally the script degrades to a single full replacement
//! plus a warning.

use crate::deploy::DeploymentProperties;
use crate::error::{Error, Result};
use crate::manifest::document::ManifestDocument;
use crate::platform::CloudDomain;

/// One text edit over the original manifest text, in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    Replace { start: usize, end: usize, text: String },
    Insert { offset: usize, text: String },
    Delete { start: usize, end: usize },
}

impl TextEdit {
    fn start(&self) -> usize {
        match self {
            TextEdit::Replace { start, .. } | TextEdit::Delete { start, .. } => *start,
            TextEdit::Insert { offset, .. } => *offset,
        }
    }
}

/// An ordered set of edits plus any warnings produced while diffing.
#[derive(Debug, Clone, Default)]
pub struct EditScript {
    /// Held in descending start order so application never shifts offsets.
    pub edits: Vec<TextEdit>,
    pub warnings: Vec<String>,
}

impl EditScript {
    pub fn is_noop(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply the script to the text it was computed against.
    pub fn apply(&self, original: &str) -> String {
        let mut out = original.to_string();
        for edit in &self.edits {
            match edit {
                TextEdit::Replace { start, end, text } => {
                    out.replace_range(*start..*end, text);
                }
                TextEdit::Insert { offset, text } => {
                    out.insert_str(*offset, text);
                }
                TextEdit::Delete { start, end } => {
                    out.replace_range(*start..*end, "");
                }
            }
        }
        out
    }

    fn full_replacement(original: &str, replacement: String, warning: String) -> Self {
        let edits = if original == replacement {
            Vec::new()
        } else {
            vec![TextEdit::Replace {
                start: 0,
                end: original.len(),
                text: replacement,
            }]
        };
        Self {
            edits,
            warnings: vec![warning],
        }
    }
}

/// Computes edit scripts against a fixed platform domain list.
#[derive(Debug, Clone)]
pub struct Reconciler {
    domains: Vec<CloudDomain>,
}

impl Reconciler {
    pub fn new(domains: &[CloudDomain]) -> Self {
        Self {
            domains: domains.to_vec(),
        }
    }

    /// Diff local manifest text against live deployment properties.
    ///
    /// Never fails: structural problems downgrade to a full-text replacement
    /// with an explanatory warning.
    pub fn diff(&self, local_text: &str, live: &DeploymentProperties) -> EditScript {
        match self.diff_structural(local_text, live) {
            Ok(script) => script,
            Err(err) => {
                let replacement = self.render(live);
                EditScript::full_replacement(
                    local_text,
                    replacement,
                    format!("manifest could not be merged in place: {}", err),
                )
            }
        }
    }

    fn render(&self, live: &DeploymentProperties) -> String {
        let doc = ManifestDocument::from_properties(live, &self.domains);
        // from_properties builds plain mappings and sequences; serializing
        // them cannot fail
        doc.serialize().unwrap_or_default()
    }

    fn diff_structural(&self, local_text: &str, live: &DeploymentProperties) -> Result<EditScript> {
        let doc = ManifestDocument::parse(local_text)
            .map_err(|e| Error::Merge(format!("local manifest does not parse: {}", e)))?;

        let mut warnings = Vec::new();
        if doc.has_inherit() {
            warnings.push(
                "manifest inherits from a parent file; inherited values are not \
                 considered, merge with caution"
                    .to_string(),
            );
        }

        let desired = self.render(live);
        let mut edits = line_diff(local_text, &desired);
        edits.reverse();
        Ok(EditScript { edits, warnings })
    }
}

/// Line-granular diff producing edits in ascending offset order.
fn line_diff(old_text: &str, new_text: &str) -> Vec<TextEdit> {
    let old: Vec<&str> = old_text.split_inclusive('\n').collect();
    let new: Vec<&str> = new_text.split_inclusive('\n').collect();
    let n = old.len();
    let m = new.len();

    // offsets[k] is the byte offset of old line k
    let mut offsets = Vec::with_capacity(n + 1);
    let mut total = 0;
    for line in &old {
        offsets.push(total);
        total += line.len();
    }
    offsets.push(total);

    // longest common subsequence lengths, lcs[i][j] over suffixes
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            i += 1;
            j += 1;
            continue;
        }

        let del_start = i;
        let mut inserted = String::new();
        while (i < n || j < m) && !(i < n && j < m && old[i] == new[j]) {
            if i < n && (j >= m || lcs[i + 1][j] >= lcs[i][j + 1]) {
                i += 1;
            } else {
                inserted.push_str(new[j]);
                j += 1;
            }
        }

        let start = offsets[del_start];
        let end = offsets[i];
        let edit = if del_start == i {
            TextEdit::Insert {
                offset: start,
                text: inserted,
            }
        } else if inserted.is_empty() {
            TextEdit::Delete { start, end }
        } else {
            TextEdit::Replace {
                start,
                end,
                text: inserted,
            }
        };
        edits.push(edit);
    }

    debug_assert!(edits.windows(2).all(|w| w[0].start() <= w[1].start()));
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler(domains: &[&str]) -> Reconciler {
        let ds: Vec<CloudDomain> = domains.iter().map(|d| CloudDomain::new(*d)).collect();
        Reconciler::new(&ds)
    }

    fn props(name: &str, memory: i64, routes: &[&str]) -> DeploymentProperties {
        let mut p = DeploymentProperties::new(name);
        p.memory_mb = memory;
        p.routes = routes.iter().map(|r| r.to_string()).collect();
        p
    }

    #[test]
    fn identical_manifest_is_a_noop() {
        let r = reconciler(&["cfapps.io"]);
        let live = props("web", 512, &["web.cfapps.io"]);
        let text = r.render(&live);

        let script = r.diff(&text, &live);
        assert!(script.is_noop(), "edits: {:?}", script.edits);
        assert!(script.warnings.is_empty());
    }

    #[test]
    fn changed_memory_touches_only_the_memory_line() {
        let r = reconciler(&["cfapps.io"]);
        let old_text = r.render(&props("web", 512, &["web.cfapps.io"]));
        let live = props("web", 1024, &["web.cfapps.io"]);

        let script = r.diff(&old_text, &live);
        assert_eq!(script.edits.len(), 1);
        let applied = script.apply(&old_text);
        assert_eq!(applied, r.render(&live));
        assert!(applied.contains("name: web"));
    }

    #[test]
    fn unparseable_text_degrades_to_full_replacement() {
        let r = reconciler(&["cfapps.io"]);
        let live = props("web", 512, &["web.cfapps.io"]);

        let script = r.diff("applications: [unbalanced", &live);
        assert_eq!(script.edits.len(), 1);
        assert!(matches!(script.edits[0], TextEdit::Replace { start: 0, .. }));
        assert_eq!(script.warnings.len(), 1);
        assert_eq!(script.apply("applications: [unbalanced"), r.render(&live));
    }

    #[test]
    fn inherit_directive_produces_a_warning() {
        let r = reconciler(&["cfapps.io"]);
        let live = props("web", 512, &["web.cfapps.io"]);
        let text = format!("inherit: base.yml\n{}", r.render(&live));

        let script = r.diff(&text, &live);
        assert_eq!(script.warnings.len(), 1);
        assert!(script.warnings[0].contains("inherit"));
    }

    #[test]
    fn apply_handles_multiple_edits_without_offset_drift() {
        let r = reconciler(&["cfapps.io"]);
        let old_live = {
            let mut p = props("web", 512, &["web.cfapps.io"]);
            p.instances = 2;
            p
        };
        let old_text = r.render(&old_live);

        let mut new_live = props("web", 2048, &["web.cfapps.io"]);
        new_live.instances = 4;
        new_live.bound_services = vec!["db".to_string()];

        let script = r.diff(&old_text, &new_live);
        assert!(!script.is_noop());
        assert_eq!(script.apply(&old_text), r.render(&new_live));
    }

    #[test]
    fn line_diff_emits_pure_insert_and_delete() {
        let edits = line_diff("a\nb\nc\n", "a\nc\n");
        assert_eq!(
            edits,
            vec![TextEdit::Delete { start: 2, end: 4 }]
        );

        let edits = line_diff("a\nc\n", "a\nb\nc\n");
        assert_eq!(
            edits,
            vec![TextEdit::Insert {
                offset: 2,
                text: "b\n".to_string()
            }]
        );
    }
}
