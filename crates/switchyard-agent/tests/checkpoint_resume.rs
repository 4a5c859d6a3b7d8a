use std::sync::Arc;

use switchyard_agent::{
    Checkpoint, Checkpointer, NodeId, SqliteCheckpointer, StateUpdate, TaskGraph, TaskState,
};
use switchyard_core::traits::TrajectoryStore;
use switchyard_core::types::{Strategy, TaskClassification, TaskId};
use switchyard_store::SqliteTrajectoryStore;
use switchyard_test_utils::{ScriptedGenerator, StaticSearch};

/// A checkpoint written by one process is picked up by a fresh graph after
/// a restart, and only the remaining nodes run.
#[tokio::test]
async fn resume_after_restart_runs_remaining_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let cp_path = dir.path().join("checkpoints.db");
    let store = Arc::new(SqliteTrajectoryStore::open(&dir.path().join("trajectories.db")).unwrap());
    let id = TaskId::from_string("interrupted");

    // First process: classification done, then it died before `content`
    {
        let checkpointer = SqliteCheckpointer::open(&cp_path, 16).unwrap();
        let mut cp = Checkpoint::start(TaskState::new(id.clone(), "Write a blog about Rome"));
        cp.state
            .apply(StateUpdate::classification(TaskClassification {
                task: Strategy::Content,
                choice_summary: "asks for a blog post".into(),
            }))
            .unwrap();
        cp.visited.push(NodeId::TaskClassification);
        cp.next = Some(NodeId::Content);
        checkpointer.save(&cp).unwrap();
        store.log_task_start(&id, "Write a blog about Rome").await.unwrap();
        store.log_step(&id, "task_classification").await.unwrap();
    }

    // Second process
    let generator = Arc::new(ScriptedGenerator::new(Strategy::General));
    let checkpointer = Arc::new(SqliteCheckpointer::open(&cp_path, 16).unwrap());
    let graph = TaskGraph::new(
        store.clone(),
        generator.clone(),
        Arc::new(StaticSearch::numbered(2)),
        checkpointer.clone(),
    );

    let state = graph.resume(&id).await.unwrap();
    assert_eq!(state.strategy(), Some(Strategy::Content));
    assert_eq!(state.search_results.as_ref().map(Vec::len), Some(2));
    assert_eq!(state.response, "scripted content response");

    // The classifier did not run again
    assert!(generator.prompts().iter().all(|p| !p.contains("Analyze the following prompt")));

    let record = store.get_task(&id).await.unwrap().unwrap();
    assert_eq!(
        record.node_names(),
        vec!["task_classification", "content", "content_post_web_search"]
    );

    let cp = checkpointer.load(&id).unwrap().unwrap();
    assert!(cp.is_finished());
}
