//! Project file I/O.
//!
//! [`load_project`] parses a project file, delegates the heavy lifting
//! (migration, repair, synchronization) to the core, sets the work
//! directory to the file's parent, and checks the user directories into the
//! notification inbox -- the same sequence every front end goes through.

use std::fs;
use std::path::Path;

use tracing::debug;

use pipeworks_core::{NotificationInbox, Project, ValidationReport};

use crate::error::StorageError;

/// Loads a project from a file.
///
/// Structural problems are repaired and land in `report`; missing user
/// directories land in `notifications`. Only I/O and malformed JSON are
/// errors.
pub fn load_project(
    path: &Path,
    report: &mut ValidationReport,
    notifications: &mut NotificationInbox,
) -> Result<Project, StorageError> {
    let text = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let mut project = Project::from_json(&value, report)?;
    if let Some(parent) = path.parent() {
        project.set_work_directory(parent);
    }
    project.validate_user_directories(notifications);
    debug!(
        path = %path.display(),
        nodes = project.detail_graph().node_count(),
        compartments = project.compartments().len(),
        "loaded project"
    );
    Ok(project)
}

/// Saves a project to a file, pretty-printed.
pub fn save_project(path: &Path, project: &Project) -> Result<(), StorageError> {
    let value = project.to_json()?;
    let text = serde_json::to_string_pretty(&value)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeworks_core::{DataTypeId, NodeKind, PipelineNode, SlotRef};

    #[test]
    fn file_roundtrip_reproduces_the_graphs() {
        let mut project = Project::new();
        let a = project.add_compartment("A").unwrap();
        let b = project.add_compartment("B").unwrap();
        project
            .declare_compartment_output(a, "out", DataTypeId::IMAGE)
            .unwrap();
        project.connect_compartments(a, b).unwrap();

        let adapter = project.compartment(a).unwrap().output_adapters["out"];
        let mut consumer = PipelineNode::new("Blur", NodeKind::Ordinary);
        consumer.add_input_slot("in", DataTypeId::IMAGE).unwrap();
        let consumer_id = project
            .detail_graph_mut()
            .insert_node(consumer, Some(b))
            .unwrap();
        project
            .detail_graph_mut()
            .connect(
                &SlotRef::output(adapter, "out"),
                &SlotRef::input(consumer_id, "in"),
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pwp");
        save_project(&path, &project).unwrap();

        let mut report = ValidationReport::new();
        let mut notifications = NotificationInbox::new();
        let loaded = load_project(&path, &mut report, &mut notifications).unwrap();

        assert_eq!(report.error_count(), 0);
        assert_eq!(
            loaded.detail_graph().node_count(),
            project.detail_graph().node_count()
        );
        assert_eq!(
            loaded.detail_graph().edge_count(),
            project.detail_graph().edge_count()
        );
        assert_eq!(loaded.compartments().len(), 2);
        assert_eq!(loaded.work_directory(), Some(dir.path()));
    }

    #[test]
    fn missing_user_directory_raises_a_notification() {
        let mut project = Project::new();
        project
            .metadata
            .directories
            .insert("raw".into(), "missing-input-folder".into());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pwp");
        save_project(&path, &project).unwrap();

        let mut report = ValidationReport::new();
        let mut notifications = NotificationInbox::new();
        load_project(&path, &mut report, &mut notifications).unwrap();

        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let mut report = ValidationReport::new();
        let mut notifications = NotificationInbox::new();
        let result = load_project(
            Path::new("/nonexistent/project.pwp"),
            &mut report,
            &mut notifications,
        );
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pwp");
        fs::write(&path, "{ not json").unwrap();

        let mut report = ValidationReport::new();
        let mut notifications = NotificationInbox::new();
        let result = load_project(&path, &mut report, &mut notifications);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
