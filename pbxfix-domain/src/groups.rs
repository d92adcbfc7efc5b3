//! Read-only view of the group hierarchy.

use pbxfix_edit::{Document, DocumentError, Record};
use pbxfix_types::manifest::normalize_path;
use std::collections::HashMap;

const MAX_DEPTH: usize = 64;

/// Name Xcode shows for a group or file: `name`, else the last component of `path`, else the
/// record comment.
pub fn display_name(record: &Record) -> Option<&str> {
    record
        .scalar("name")
        .or_else(|| record.scalar("path").and_then(|p| p.rsplit('/').find(|c| !c.is_empty())))
        .or_else(|| record.comment())
}

/// Where a `/`-separated group path lands in the current tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'d> {
    /// Identifiers of the groups that exist, outermost first. Never empty.
    pub existing: Vec<&'d str>,
    /// Trailing components that have to be created.
    pub missing: Vec<String>,
}

impl<'d> Resolution<'d> {
    pub fn deepest(&self) -> &'d str {
        self.existing.last().copied().unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct GroupTree<'d> {
    doc: &'d Document,
    groups: Vec<&'d Record>,
    parents: HashMap<&'d str, &'d str>,
    main: Option<&'d str>,
}

impl<'d> GroupTree<'d> {
    pub fn new(doc: &'d Document) -> Result<Self, DocumentError> {
        let groups: Vec<&'d Record> = doc
            .section("PBXGroup")?
            .records()
            .iter()
            .filter(|r| r.isa() == Some("PBXGroup"))
            .collect();

        let mut parents = HashMap::new();
        for &group in &groups {
            for child in group.list("children").unwrap_or_default() {
                parents.entry(child).or_insert(group.id().as_str());
            }
        }

        let main = doc
            .section("PBXProject")
            .ok()
            .and_then(|s| s.records().first())
            .and_then(|p| p.scalar("mainGroup"));

        Ok(Self {
            doc,
            groups,
            parents,
            main,
        })
    }

    pub fn parent(&self, id: &str) -> Option<&'d str> {
        self.parents.get(id).copied()
    }

    /// Every record listed in the `children` of group `id`.
    pub fn children(&self, id: &str) -> Vec<&'d Record> {
        let doc = self.doc;
        doc.record(id)
            .and_then(|g| g.list("children"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| doc.record(c))
            .collect()
    }

    pub fn child_groups(&self, id: &str) -> Vec<&'d Record> {
        self.children(id)
            .into_iter()
            .filter(|r| r.isa() == Some("PBXGroup"))
            .collect()
    }

    /// Walk `path` down the tree. The first component must name exactly one group.
    pub fn resolve(&self, path: &str) -> Result<Resolution<'d>, DocumentError> {
        let normalized = normalize_path(path);
        let mut components = normalized.split('/').filter(|c| !c.is_empty());
        let Some(first) = components.next() else {
            return Err(DocumentError::record_not_found("group with an empty path", 0));
        };

        let mut current = self.root_group(first)?;
        let mut existing = vec![current];
        let mut missing = Vec::new();
        for component in components {
            if !missing.is_empty() {
                missing.push(component.to_string());
                continue;
            }
            let hits: Vec<&'d Record> = self
                .child_groups(current)
                .into_iter()
                .filter(|g| display_name(g) == Some(component))
                .collect();
            match hits.as_slice() {
                [] => missing.push(component.to_string()),
                [only] => {
                    current = only.id().as_str();
                    existing.push(current);
                }
                _ => {
                    return Err(DocumentError::record_not_found(
                        format!("group {component} under {current}"),
                        hits.len(),
                    ));
                }
            }
        }
        Ok(Resolution { existing, missing })
    }

    fn root_group(&self, name: &str) -> Result<&'d str, DocumentError> {
        let mut hits: Vec<&'d Record> = self
            .groups
            .iter()
            .copied()
            .filter(|g| display_name(g) == Some(name))
            .collect();
        if hits.is_empty() {
            hits = self
                .groups
                .iter()
                .copied()
                .filter(|g| g.id().as_str() == name)
                .collect();
        }
        match hits.as_slice() {
            [only] => Ok(only.id().as_str()),
            _ => Err(DocumentError::record_not_found(
                format!("group {name}"),
                hits.len(),
            )),
        }
    }

    /// Source-root-relative directory of a group or file record.
    ///
    /// `None` when the location depends on a source tree other than `<group>` or `SOURCE_ROOT`.
    pub fn location(&self, id: &str) -> Option<String> {
        self.location_at(id, 0)
    }

    fn location_at(&self, id: &str, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        let record = self.doc.record(id)?;
        let own = record.scalar("path").unwrap_or("");
        match record.scalar("sourceTree").unwrap_or("<group>") {
            "<group>" => {
                let base = match self.parent(id) {
                    Some(parent) => self.location_at(parent, depth + 1)?,
                    None => String::new(),
                };
                Some(normalize_path(&format!("{base}/{own}")))
            }
            "SOURCE_ROOT" => Some(normalize_path(own)),
            _ => None,
        }
    }

    /// The `PBXFileReference` whose resolved location is `path`.
    pub fn file_reference_at(&self, path: &str) -> Option<&'d Record> {
        let wanted = normalize_path(path);
        let refs = self.doc.section("PBXFileReference").ok()?;
        refs.records()
            .iter()
            .find(|r| self.location(r.id().as_str()).as_deref() == Some(wanted.as_str()))
    }

    /// Every group path, depth first, in document order.
    pub fn paths(&self) -> Vec<String> {
        let mut roots: Vec<&'d str> = self
            .groups
            .iter()
            .map(|g| g.id().as_str())
            .filter(|id| self.parent(id).is_none())
            .collect();
        if let Some(main) = self.main {
            roots.retain(|id| *id != main);
            roots.insert(0, main);
        }

        let mut out = Vec::new();
        for root in roots {
            self.walk(root, "", &mut out, 0);
        }
        out
    }

    fn walk(&self, id: &str, prefix: &str, out: &mut Vec<String>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        let here = match self.doc.record(id).and_then(display_name) {
            Some(name) if Some(id) != self.main => {
                let path = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                };
                out.push(path.clone());
                path
            }
            _ => prefix.to_string(),
        };
        for child in self.child_groups(id) {
            self.walk(child.id().as_str(), &here, out, depth + 1);
        }
    }
}
