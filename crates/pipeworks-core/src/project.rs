//! Project: the dual-graph container tying both layers together.
//!
//! A [`Project`] owns the detail graph of executable nodes, the coarse
//! compartment graph, and the compartment set, and runs the synchronizers
//! after compartment-graph edits so that the two layers stay mutually
//! consistent.
//!
//! There is no event bus: public mutation methods apply their edit and then
//! invoke [`compartment_graph_changed`](Project::compartment_graph_changed),
//! the one orchestrator that registers new compartments, reconciles output
//! adapters, recomputes visibility, and pushes at most one batched
//! [`ProjectEvent::GraphChanged`] into the outbox. Callers editing the
//! compartment graph directly through
//! [`compartment_graph_mut`](Project::compartment_graph_mut) invoke the
//! orchestrator themselves once their batch is applied.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compartment::Compartment;
use crate::data_type::{DataTypeId, DataTypeRegistry};
use crate::error::CoreError;
use crate::factory::{NodeFactory, StandardNodeFactory};
use crate::graph::PipelineGraph;
use crate::id::{CompartmentId, NodeId};
use crate::node::{NodeKind, PipelineNode};
use crate::notify::{Notification, NotificationInbox, ProjectEvent};
use crate::phase::{PhaseState, ProjectPhase};
use crate::slot::{SlotDef, SlotDirection, SlotRef};
use crate::sync::{synchronize_compartment_outputs, synchronize_visibility};

/// Current version of the persisted project format.
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Project metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
    /// User-defined directories, resolved against the work directory.
    pub directories: IndexMap<String, PathBuf>,
}

/// The data-storage settings sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DataStorageSettings {
    pub force_global_temp_directory: bool,
    pub override_temp_directory: Option<PathBuf>,
}

impl DataStorageSettings {
    /// Sheet id in the persisted `settings` object.
    pub const SHEET_ID: &'static str = "data-storage";
}

/// A pipeline project.
pub struct Project {
    pub(crate) detail_graph: PipelineGraph,
    pub(crate) compartment_graph: PipelineGraph,
    pub(crate) compartments: IndexMap<CompartmentId, Compartment>,
    pub data_types: DataTypeRegistry,
    pub metadata: ProjectMetadata,
    pub settings: DataStorageSettings,
    /// Settings sheets from unknown plugins, preserved verbatim for saving.
    pub(crate) unloaded_settings: IndexMap<String, serde_json::Value>,
    pub(crate) phase: PhaseState,
    pub(crate) events: Vec<ProjectEvent>,
    pub(crate) work_directory: Option<PathBuf>,
    factory: Box<dyn NodeFactory>,
}

impl Project {
    /// Creates an empty project with the standard node factory.
    pub fn new() -> Self {
        Self::with_factory(Box::new(StandardNodeFactory))
    }

    /// Creates an empty project with a custom adapter-node factory.
    pub fn with_factory(factory: Box<dyn NodeFactory>) -> Self {
        Project {
            detail_graph: PipelineGraph::new(),
            compartment_graph: PipelineGraph::new(),
            compartments: IndexMap::new(),
            data_types: DataTypeRegistry::new(),
            metadata: ProjectMetadata::default(),
            settings: DataStorageSettings::default(),
            unloaded_settings: IndexMap::new(),
            phase: PhaseState::new(),
            events: Vec::new(),
            work_directory: None,
            factory,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The detail graph of executable nodes.
    pub fn detail_graph(&self) -> &PipelineGraph {
        &self.detail_graph
    }

    /// Mutable access for user edits to the detail graph.
    pub fn detail_graph_mut(&mut self) -> &mut PipelineGraph {
        &mut self.detail_graph
    }

    /// The compartment graph. Contains only `Compartment`-kind nodes.
    pub fn compartment_graph(&self) -> &PipelineGraph {
        &self.compartment_graph
    }

    /// Mutable access for direct compartment-graph edits. Call
    /// [`compartment_graph_changed`](Self::compartment_graph_changed) once
    /// the batch of edits is applied.
    pub fn compartment_graph_mut(&mut self) -> &mut PipelineGraph {
        &mut self.compartment_graph
    }

    pub fn compartments(&self) -> &IndexMap<CompartmentId, Compartment> {
        &self.compartments
    }

    pub fn compartment(&self, id: CompartmentId) -> Option<&Compartment> {
        self.compartments.get(&id)
    }

    /// Finds a compartment by UUID string, alias, or name.
    pub fn find_compartment(&self, key: &str) -> Option<CompartmentId> {
        let node = self.compartment_graph.find_node(key)?;
        let id = CompartmentId::of_node(node);
        self.compartments.contains_key(&id).then_some(id)
    }

    pub fn phase(&self) -> ProjectPhase {
        self.phase.current()
    }

    pub fn work_directory(&self) -> Option<&Path> {
        self.work_directory.as_deref()
    }

    pub fn set_work_directory(&mut self, directory: impl Into<PathBuf>) {
        self.work_directory = Some(directory.into());
    }

    /// Drains the pending change events.
    pub fn take_events(&mut self) -> Vec<ProjectEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Compartment lifecycle
    // -----------------------------------------------------------------------

    /// Adds a new compartment with one wildcard input and no declared
    /// outputs. Output adapters appear lazily once outputs are declared.
    pub fn add_compartment(&mut self, name: &str) -> Result<CompartmentId, CoreError> {
        let mut stand_in = PipelineNode::new(name, NodeKind::Compartment);
        stand_in.add_input_slot("in", DataTypeId::ANY)?;
        let node = self.compartment_graph.insert_node(stand_in, None)?;
        let id = CompartmentId::of_node(node);
        self.compartments
            .insert(id, Compartment::new(id, name, node));
        self.compartment_graph_changed()?;
        Ok(id)
    }

    /// Declares a new output slot on a compartment; the output-slot
    /// synchronizer creates the matching adapter.
    pub fn declare_compartment_output(
        &mut self,
        compartment: CompartmentId,
        name: &str,
        data_type: DataTypeId,
    ) -> Result<(), CoreError> {
        let node = self.stand_in_node(compartment)?;
        self.compartment_graph
            .add_slot(node, SlotDirection::Output, SlotDef::new(name, data_type))?;
        self.compartment_graph_changed()
    }

    /// Removes a declared output slot; the adapter is deleted on the next
    /// synchronization pass (run here).
    pub fn remove_compartment_output(
        &mut self,
        compartment: CompartmentId,
        name: &str,
    ) -> Result<(), CoreError> {
        let node = self.stand_in_node(compartment)?;
        self.compartment_graph
            .remove_slot(node, SlotDirection::Output, name)?;
        self.compartment_graph_changed()
    }

    /// Connects `source`'s first output slot to `target`'s first input slot
    /// in the compartment graph. This alone is sufficient to widen
    /// visibility on the next synchronization pass.
    pub fn connect_compartments(
        &mut self,
        source: CompartmentId,
        target: CompartmentId,
    ) -> Result<(), CoreError> {
        let source_node = self.stand_in_node(source)?;
        let target_node = self.stand_in_node(target)?;

        let source_slot = self
            .compartment_graph
            .node(source_node)
            .and_then(|n| n.first_output_slot())
            .map(|s| s.name.clone())
            .ok_or(CoreError::NoSlots {
                node: source_node,
                direction: SlotDirection::Output,
            })?;
        let target_slot = self
            .compartment_graph
            .node(target_node)
            .and_then(|n| n.first_input_slot())
            .map(|s| s.name.clone())
            .ok_or(CoreError::NoSlots {
                node: target_node,
                direction: SlotDirection::Input,
            })?;

        self.compartment_graph.connect(
            &SlotRef::output(source_node, source_slot),
            &SlotRef::input(target_node, target_slot),
        )?;
        self.compartment_graph_changed()
    }

    /// Removes a compartment, preserving downstream topology.
    ///
    /// Every consumer of one of the compartment's output adapters is rewired
    /// to a freshly minted pass-through interface inside its own compartment
    /// before the adapter, the compartment's remaining nodes, and its
    /// stand-in node are deleted. Emits `CompartmentRemoved`.
    pub fn remove_compartment(&mut self, id: CompartmentId) -> Result<(), CoreError> {
        let compartment = self
            .compartments
            .get(&id)
            .cloned()
            .ok_or(CoreError::CompartmentNotFound { id })?;

        for &adapter_id in compartment.output_adapters.values() {
            self.replace_output_with_io_interface(&compartment, adapter_id)?;
        }

        for &adapter_id in compartment.output_adapters.values() {
            if self.detail_graph.node(adapter_id).is_some() {
                self.detail_graph.remove_node(adapter_id)?;
            }
        }
        self.detail_graph.remove_nodes_in_compartment(id);

        self.compartments.shift_remove(&id);
        if self.compartment_graph.node(compartment.node).is_some() {
            self.compartment_graph.remove_node(compartment.node)?;
        }
        self.compartment_graph_changed()?;
        self.events
            .push(ProjectEvent::CompartmentRemoved { compartment: id });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Synchronization orchestrator
    // -----------------------------------------------------------------------

    /// Runs the synchronizers after a batch of compartment-graph edits.
    ///
    /// Suppressed while the project is `Loading` or `Rebuilding`. Registers
    /// any stand-in node not yet tracked as a compartment, reconciles output
    /// adapters per compartment, recomputes visibility globally, and pushes
    /// one batched `GraphChanged` event when anything changed.
    pub fn compartment_graph_changed(&mut self) -> Result<(), CoreError> {
        if self.phase.suppresses_synchronization() {
            return Ok(());
        }
        let changed = self.run_synchronizers()?;
        if changed {
            self.events.push(ProjectEvent::GraphChanged);
        }
        Ok(())
    }

    /// Re-derives the compartment set from the compartment graph, then
    /// synchronizes. Adapter maps are rebuilt by the output-slot
    /// synchronizer's reuse search.
    pub fn rebuild_compartments_from_graph(&mut self) -> Result<(), CoreError> {
        self.compartments.clear();
        self.compartment_graph_changed()
    }

    /// Regenerates human-readable alias IDs on both graphs under the
    /// `Rebuilding` phase.
    pub fn rebuild_alias_ids(&mut self, force: bool) -> Result<(), CoreError> {
        self.phase.enter(ProjectPhase::Rebuilding)?;
        self.compartment_graph.rebuild_alias_ids(force);
        self.detail_graph.rebuild_alias_ids(force);
        self.phase.leave();
        Ok(())
    }

    pub(crate) fn run_synchronizers(&mut self) -> Result<bool, CoreError> {
        // Register stand-ins that appeared through direct graph edits.
        let stand_ins: Vec<(NodeId, String)> = self
            .compartment_graph
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Compartment))
            .map(|n| (n.id, n.name.clone()))
            .collect();
        for (node, name) in stand_ins {
            let id = CompartmentId::of_node(node);
            self.compartments
                .entry(id)
                .or_insert_with(|| Compartment::new(id, name, node));
        }

        let mut changed = false;
        let ids: Vec<CompartmentId> = self.compartments.keys().copied().collect();
        for id in ids {
            let Some(mut compartment) = self.compartments.get(&id).cloned() else {
                continue;
            };
            changed |= synchronize_compartment_outputs(
                &mut self.detail_graph,
                &self.compartment_graph,
                &mut compartment,
                self.factory.as_ref(),
            )?;
            self.compartments.insert(id, compartment);
        }

        let outcome = synchronize_visibility(
            &mut self.detail_graph,
            &self.compartment_graph,
            &self.compartments,
            self.factory.as_ref(),
        )?;
        Ok(changed || outcome.changed)
    }

    /// Rewires every external consumer of `output_node` to a pass-through
    /// interface inside the consumer's compartment, unless the consumers
    /// already are a single such interface.
    fn replace_output_with_io_interface(
        &mut self,
        compartment: &Compartment,
        output_node: NodeId,
    ) -> Result<(), CoreError> {
        let Some(source) = self.detail_graph.node(output_node) else {
            return Ok(());
        };
        let source_name = source.name.clone();
        let source_locations = source.locations.clone();
        let pass_through = source.ordered_output_slots();
        let signature = source.output_signature();

        // Group outgoing edges by consuming compartment; edges inside the
        // doomed compartment vanish with it.
        let mut by_compartment: IndexMap<CompartmentId, Vec<(SlotRef, SlotRef)>> =
            IndexMap::new();
        for (from, to) in self.detail_graph.outgoing_edges(output_node) {
            let Some(target_compartment) =
                self.detail_graph.node(to.node).and_then(|n| n.compartment)
            else {
                continue;
            };
            if target_compartment == compartment.id {
                continue;
            }
            by_compartment
                .entry(target_compartment)
                .or_default()
                .push((from, to));
        }

        for (target_compartment, edges) in by_compartment {
            let mut consumer_nodes: Vec<NodeId> = edges.iter().map(|(_, to)| to.node).collect();
            consumer_nodes.sort();
            consumer_nodes.dedup();
            let single_matching_interface = consumer_nodes.len() == 1
                && edges.iter().all(|(_, to)| {
                    self.detail_graph.node(to.node).map_or(false, |n| {
                        matches!(n.kind, NodeKind::IoInterface)
                            && n.input_signature() == signature
                    })
                });
            if single_matching_interface {
                continue;
            }

            let mut adapter = self.factory.io_interface(&source_name);
            adapter.set_pass_through_slots(&pass_through);
            adapter.locations = source_locations.clone();
            let adapter_id = self
                .detail_graph
                .insert_node(adapter, Some(target_compartment))?;
            for (from, to) in &edges {
                self.detail_graph
                    .connect(&SlotRef::output(adapter_id, &from.slot), to)?;
            }
        }
        Ok(())
    }

    fn stand_in_node(&self, compartment: CompartmentId) -> Result<NodeId, CoreError> {
        self.compartments
            .get(&compartment)
            .map(|c| c.node)
            .ok_or(CoreError::CompartmentNotFound { id: compartment })
    }

    // -----------------------------------------------------------------------
    // User directories
    // -----------------------------------------------------------------------

    /// Checks that the metadata's user directories exist, pushing a
    /// notification per missing one. Requires a work directory to resolve
    /// relative paths against.
    pub fn validate_user_directories(&self, notifications: &mut NotificationInbox) {
        let Some(work_directory) = &self.work_directory else {
            return;
        };
        for (key, directory) in &self.metadata.directories {
            let resolved = if directory.is_absolute() {
                directory.clone()
            } else {
                work_directory.join(directory)
            };
            if !resolved.is_dir() {
                notifications.push(Notification::new(
                    "pipeworks:invalid-project-user-directory",
                    "Invalid project user directory",
                    format!(
                        "The user directory '{}' points at '{}', but the referenced path does not exist.",
                        key,
                        resolved.display()
                    ),
                ));
            }
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}
