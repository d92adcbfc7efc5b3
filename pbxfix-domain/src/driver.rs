//! Mutation driver: turns a manifest into one batch of insertions on a project document.
//!
//! Planning happens first and touches nothing; only when every descriptor has been placed are
//! the records spliced in. Any structural problem aborts the whole batch.

use crate::groups::{GroupTree, display_name};
use crate::ids::IdAllocator;
use crate::synth::{self, BuildFileRecord, FileReferenceRecord, GroupRecord, Placement};
use pbxfix_edit::{Document, DocumentError, ListEntry, Record, end_marker};
use pbxfix_types::ObjectId;
use pbxfix_types::manifest::{FileDescriptor, Manifest, normalize_path};
use pbxfix_types::report::{AddedFile, CreatedGroup, SkipReason, SkippedFile};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    /// Name of the `PBXNativeTarget` whose sources phase receives the build files.
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub added: Vec<AddedFile>,
    pub skipped: Vec<SkippedFile>,
    pub groups_created: Vec<CreatedGroup>,
}

#[derive(Debug, Clone)]
pub struct Mutation {
    /// The complete document after the batch; the input text when nothing was added.
    pub text: String,
    pub outcome: MutationOutcome,
}

impl Mutation {
    pub fn is_noop(&self) -> bool {
        self.outcome.added.is_empty()
    }
}

/// Apply `manifest` to `doc` and return the rendered document.
///
/// Descriptors whose path the project already references are skipped, so running the same
/// manifest twice leaves the document byte-identical.
pub fn apply(
    doc: &Document,
    manifest: &Manifest,
    options: &MutationOptions,
) -> Result<Mutation, DocumentError> {
    if let Some(dup) = doc.duplicate_ids().first() {
        return Err(DocumentError::DuplicateIdentifier { id: dup.to_string() });
    }

    let mut batch = Batch::new(doc, options.target.as_deref())?;
    for descriptor in &manifest.files {
        batch.add(descriptor, manifest)?;
    }
    batch.render()
}

/// Group paths of the project, one per group, depth first.
pub fn group_paths(doc: &Document) -> Result<Vec<String>, DocumentError> {
    Ok(GroupTree::new(doc)?.paths())
}

/// The sources build phase new build files go into.
///
/// With a target name, that `PBXNativeTarget`'s sources phase; without one, the first native
/// target's; when the project has no native targets, its only sources phase.
pub fn select_sources_phase(
    doc: &Document,
    target: Option<&str>,
) -> Result<ObjectId, DocumentError> {
    let phases = doc.section("PBXSourcesBuildPhase")?;
    let natives: &[Record] = doc
        .section("PBXNativeTarget")
        .map(|s| s.records())
        .unwrap_or(&[]);

    let chosen = match target {
        Some(name) => {
            let hits: Vec<&Record> = natives
                .iter()
                .filter(|t| t.scalar("name") == Some(name))
                .collect();
            match hits.as_slice() {
                [only] => Some(*only),
                _ => {
                    return Err(DocumentError::record_not_found(
                        format!("native target {name}"),
                        hits.len(),
                    ));
                }
            }
        }
        None => natives.first(),
    };

    let (what, candidates): (String, Vec<&Record>) = match chosen {
        Some(t) => (
            format!(
                "sources build phase of target {}",
                t.scalar("name").unwrap_or(t.id().as_str())
            ),
            t.list("buildPhases")
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| doc.record(id))
                .filter(|r| r.isa() == Some("PBXSourcesBuildPhase"))
                .collect(),
        ),
        None => (
            "sources build phase".to_string(),
            phases.records().iter().collect(),
        ),
    };

    match candidates.as_slice() {
        [only] => Ok(only.id().clone()),
        _ => Err(DocumentError::record_not_found(what, candidates.len())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Existing(ObjectId),
    New(usize),
}

struct NewGroup {
    record: GroupRecord,
    path: String,
    parent: Slot,
    dir: Option<String>,
}

/// A new group linked into a group that already exists.
struct Link {
    parent: ObjectId,
    after: Option<String>,
    entry: ListEntry,
}

struct Batch<'d> {
    doc: &'d Document,
    tree: GroupTree<'d>,
    ids: IdAllocator,
    target: Option<&'d str>,
    sources: Option<ObjectId>,
    seen: BTreeSet<String>,
    new_groups: Vec<NewGroup>,
    new_group_index: HashMap<String, usize>,
    links: Vec<Link>,
    children: Vec<(ObjectId, Vec<ListEntry>)>,
    build_files: Vec<BuildFileRecord>,
    file_refs: Vec<FileReferenceRecord>,
    sources_entries: Vec<ListEntry>,
    outcome: MutationOutcome,
}

impl<'d> Batch<'d> {
    fn new(doc: &'d Document, target: Option<&'d str>) -> Result<Self, DocumentError> {
        Ok(Self {
            doc,
            tree: GroupTree::new(doc)?,
            ids: IdAllocator::from_document(doc),
            target,
            sources: None,
            seen: BTreeSet::new(),
            new_groups: Vec::new(),
            new_group_index: HashMap::new(),
            links: Vec::new(),
            children: Vec::new(),
            build_files: Vec::new(),
            file_refs: Vec::new(),
            sources_entries: Vec::new(),
            outcome: MutationOutcome::default(),
        })
    }

    fn add(
        &mut self,
        descriptor: &FileDescriptor,
        manifest: &Manifest,
    ) -> Result<(), DocumentError> {
        let path = descriptor.normalized_path();
        let group = normalize_path(&descriptor.group);

        if !self.seen.insert(path.clone()) {
            debug!(path = %path, "skipping repeated manifest entry");
            self.skip(path, group, SkipReason::DuplicateInManifest, None);
            return Ok(());
        }
        if let Some(existing) = self.tree.file_reference_at(&path) {
            debug!(path = %path, id = %existing.id(), "already referenced");
            let existing = existing.id().clone();
            self.skip(path, group, SkipReason::AlreadyReferenced, Some(existing));
            return Ok(());
        }

        let slot = self.slot_for(&group, manifest)?;
        let dir = self.slot_dir(&slot);
        let target = if synth::compiles(descriptor) {
            self.sources_phase()?.to_string()
        } else {
            String::new()
        };
        let file = synth::synthesize(
            descriptor,
            &Placement {
                group_dir: dir.as_deref(),
                target: &target,
            },
            &mut self.ids,
        );

        match slot {
            Slot::Existing(id) => self.push_child(id, file.group_entry.clone()),
            Slot::New(index) => self.new_groups[index]
                .record
                .children
                .push(file.group_entry.clone()),
        }
        if let Some(entry) = file.sources_entry {
            self.sources_entries.push(entry);
        }

        debug!(path = %path, group = %group, file_ref = %file.file_reference.id, "planned file");
        self.outcome.added.push(AddedFile {
            path,
            name: file.file_reference.display_name.clone(),
            group,
            file_ref: file.file_reference.id.clone(),
            build_file: file.build_file.as_ref().map(|b| b.id.clone()),
        });
        if let Some(build_file) = file.build_file {
            self.build_files.push(build_file);
        }
        self.file_refs.push(file.file_reference);
        Ok(())
    }

    fn skip(
        &mut self,
        path: String,
        group: String,
        reason: SkipReason,
        existing: Option<ObjectId>,
    ) {
        self.outcome.skipped.push(SkippedFile {
            path,
            group,
            reason,
            existing,
        });
    }

    fn push_child(&mut self, group: ObjectId, entry: ListEntry) {
        match self.children.iter_mut().find(|(id, _)| *id == group) {
            Some((_, entries)) => entries.push(entry),
            None => self.children.push((group, vec![entry])),
        }
    }

    fn sources_phase(&mut self) -> Result<ObjectId, DocumentError> {
        if let Some(id) = &self.sources {
            return Ok(id.clone());
        }
        let id = select_sources_phase(self.doc, self.target)?;
        debug!(phase = %id, "selected sources build phase");
        self.sources = Some(id.clone());
        Ok(id)
    }

    /// The group a file in `group_path` goes into, creating missing groups on the way.
    fn slot_for(&mut self, group_path: &str, manifest: &Manifest) -> Result<Slot, DocumentError> {
        if let Some(&index) = self.new_group_index.get(group_path) {
            return Ok(Slot::New(index));
        }

        let resolution = self.tree.resolve(group_path)?;
        let deepest = self.existing_id(resolution.deepest())?;
        let mut parent = Slot::Existing(deepest);
        if resolution.is_complete() {
            return Ok(parent);
        }

        let mut path = group_path
            .split('/')
            .take(resolution.existing.len())
            .collect::<Vec<_>>()
            .join("/");
        for name in &resolution.missing {
            path = format!("{path}/{name}");
            if let Some(&index) = self.new_group_index.get(&path) {
                parent = Slot::New(index);
                continue;
            }

            let record = synth::synthesize_group(name, &path, &mut self.ids);
            let after = manifest.placement_for(&path).and_then(|p| p.after.clone());
            let dir = self
                .slot_dir(&parent)
                .map(|d| normalize_path(&format!("{d}/{name}")));
            let entry = record.entry();

            match &parent {
                Slot::Existing(id) => self.links.push(Link {
                    parent: id.clone(),
                    after,
                    entry,
                }),
                Slot::New(index) => {
                    let siblings = &mut self.new_groups[*index].record.children;
                    let at = match after {
                        Some(after) => {
                            let hits: Vec<usize> = siblings
                                .iter()
                                .enumerate()
                                .filter(|(_, c)| c.comment.as_deref() == Some(after.as_str()))
                                .map(|(i, _)| i)
                                .collect();
                            match hits.as_slice() {
                                [i] => i + 1,
                                _ => {
                                    return Err(DocumentError::AnchorNotFound {
                                        anchor: after,
                                        matches: hits.len(),
                                    });
                                }
                            }
                        }
                        None => siblings.len(),
                    };
                    siblings.insert(at, entry);
                }
            }

            debug!(path = %path, id = %record.id, "planned group");
            let parent_id = self.slot_id(&parent);
            self.outcome.groups_created.push(CreatedGroup {
                path: path.clone(),
                id: record.id.clone(),
                parent: parent_id,
            });
            let index = self.new_groups.len();
            self.new_groups.push(NewGroup {
                record,
                path: path.clone(),
                parent,
                dir,
            });
            self.new_group_index.insert(path.clone(), index);
            parent = Slot::New(index);
        }
        Ok(parent)
    }

    fn existing_id(&self, id: &str) -> Result<ObjectId, DocumentError> {
        self.doc
            .record(id)
            .map(|r| r.id().clone())
            .ok_or_else(|| DocumentError::record_not_found(format!("group {id}"), 0))
    }

    fn slot_id(&self, slot: &Slot) -> ObjectId {
        match slot {
            Slot::Existing(id) => id.clone(),
            Slot::New(index) => self.new_groups[*index].record.id.clone(),
        }
    }

    fn slot_dir(&self, slot: &Slot) -> Option<String> {
        match slot {
            Slot::Existing(id) => self.tree.location(id.as_str()),
            Slot::New(index) => self.new_groups[*index].dir.clone(),
        }
    }

    /// Sibling named `after` among the children of existing group `parent`.
    fn sibling(&self, parent: &ObjectId, after: &str) -> Result<ObjectId, DocumentError> {
        let hits: Vec<&Record> = self
            .tree
            .children(parent.as_str())
            .into_iter()
            .filter(|c| display_name(c) == Some(after))
            .collect();
        match hits.as_slice() {
            [only] => Ok(only.id().clone()),
            _ => Err(DocumentError::AnchorNotFound {
                anchor: after.to_string(),
                matches: hits.len(),
            }),
        }
    }

    fn render(self) -> Result<Mutation, DocumentError> {
        if self.outcome.added.is_empty() {
            info!(skipped = self.outcome.skipped.len(), "nothing to add");
            return Ok(Mutation {
                text: self.doc.text().to_string(),
                outcome: self.outcome,
            });
        }

        let nl = self.doc.line_ending();
        let mut out = self.doc.clone();

        if !self.build_files.is_empty() {
            out.section("PBXBuildFile")?;
            let text: String = self.build_files.iter().map(|b| b.render(nl)).collect();
            out.splice_before(&end_marker("PBXBuildFile"), text)?;
        }

        out.section("PBXFileReference")?;
        let text: String = self.file_refs.iter().map(|f| f.render(nl)).collect();
        out.splice_before(&end_marker("PBXFileReference"), text)?;

        if !self.new_groups.is_empty() {
            let text: String = self.new_groups.iter().map(|g| g.record.render(nl)).collect();
            out.splice_before(&end_marker("PBXGroup"), text)?;
        }

        for link in &self.links {
            let entries = std::slice::from_ref(&link.entry);
            match &link.after {
                Some(after) => {
                    let sibling = self.sibling(&link.parent, after)?;
                    out.insert_after_in_list(
                        link.parent.as_str(),
                        "children",
                        sibling.as_str(),
                        entries,
                    )?;
                }
                None => out.append_to_list(link.parent.as_str(), "children", entries)?,
            }
        }

        for (group, entries) in &self.children {
            out.append_to_list(group.as_str(), "children", entries)?;
        }

        if let Some(phase) = &self.sources {
            out.append_to_list(phase.as_str(), "files", &self.sources_entries)?;
        }

        let text = out.serialize();
        verify(&text, &self.build_files, self.sources.as_ref())?;

        for group in &self.new_groups {
            debug!(path = %group.path, parent = %self.slot_id(&group.parent), "created group");
        }
        info!(
            added = self.outcome.added.len(),
            skipped = self.outcome.skipped.len(),
            groups = self.new_groups.len(),
            "rendered project changes"
        );
        Ok(Mutation {
            text,
            outcome: self.outcome,
        })
    }
}

/// Re-read the rendered document and check the relationships the batch promised.
fn verify(
    text: &str,
    build_files: &[BuildFileRecord],
    phase: Option<&ObjectId>,
) -> Result<(), DocumentError> {
    let doc = Document::load(text)?;
    if let Some(dup) = doc.duplicate_ids().first() {
        return Err(DocumentError::DuplicateIdentifier { id: dup.to_string() });
    }

    let files = phase
        .and_then(|p| doc.record(p.as_str()))
        .and_then(|r| r.list("files"))
        .unwrap_or_default();
    for build_file in build_files {
        let resolves = doc
            .record(build_file.id.as_str())
            .and_then(|r| r.scalar("fileRef"))
            .and_then(|f| doc.record(f))
            .is_some_and(|r| r.isa() == Some("PBXFileReference"));
        if !resolves {
            return Err(DocumentError::record_not_found(
                format!("file reference of build file {}", build_file.id),
                0,
            ));
        }

        let listed = files.iter().filter(|f| **f == build_file.id.as_str()).count();
        if listed != 1 {
            return Err(DocumentError::record_not_found(
                format!("build file {} in sources build phase", build_file.id),
                listed,
            ));
        }
    }
    Ok(())
}
