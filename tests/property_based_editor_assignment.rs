// Property-Based Testing for editor assignment and workflow invariants
// Capacity must hold under concurrent assignment, and any sequence of
// engine commands must leave a workflow in a consistent state.

mod common;

use common::*;
use content_workflow::workflow::{Actor, EditorId, WorkflowId, WorkflowState};
use content_workflow::{Pipeline, Priority};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestCaseError, TestRunner};
use proptest_derive::Arbitrary;
use std::collections::HashMap;

#[derive(Debug, Clone, Arbitrary)]
struct EditorSpec {
    #[proptest(strategy = "1u32..=4")]
    max_workload: u32,
}

#[derive(Debug, Clone, Arbitrary)]
enum AssignmentRequest {
    Auto,
    Manual(#[proptest(strategy = "0usize..4")] usize),
}

#[derive(Debug, Clone, Arbitrary)]
enum Command {
    Advance(bool),
    Pause,
    Resume,
    Rollback,
    Cancel,
    Escalate,
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn runner(cases: u32) -> TestRunner {
    TestRunner::new(Config {
        cases,
        ..Config::default()
    })
}

async fn pipeline_with_editors(editors: &[EditorSpec]) -> Pipeline {
    let pipeline = pipeline();
    for (n, editor) in editors.iter().enumerate() {
        register_editor(&pipeline, &format!("ed-{}", n), editor.max_workload).await;
    }
    pipeline
}

async fn waiting_workflows(pipeline: &Pipeline, count: usize) -> Vec<WorkflowId> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let workflow = in_human_approval(pipeline, &format!("article-{}", n), Priority::Normal).await;
        ids.push(workflow.id);
    }
    ids
}

#[test]
fn prop_concurrent_auto_assignment_respects_capacity() {
    runner(24)
        .run(
            &(prop::collection::vec(any::<EditorSpec>(), 1..4), 1usize..12),
            |(editors, workflow_count)| {
                runtime().block_on(async {
                    let pipeline = pipeline_with_editors(&editors).await;
                    let ids = waiting_workflows(&pipeline, workflow_count).await;

                    let mut handles = Vec::new();
                    for id in ids {
                        let queue = pipeline.queue.clone();
                        handles.push(tokio::spawn(async move { queue.assign_editor(id, None).await }));
                    }
                    let assigned = futures::future::join_all(handles)
                        .await
                        .into_iter()
                        .filter(|joined| matches!(joined, Ok(Ok(_))))
                        .count();

                    let capacity: u32 = editors.iter().map(|e| e.max_workload).sum();
                    prop_assert_eq!(assigned, workflow_count.min(capacity as usize));

                    let mut total_workload = 0;
                    for editor in pipeline.editors.list().await {
                        prop_assert!(
                            editor.current_workload <= editor.max_workload,
                            "Editor {} over capacity: {}/{}",
                            editor.id,
                            editor.current_workload,
                            editor.max_workload
                        );
                        total_workload += editor.current_workload as usize;
                    }
                    prop_assert_eq!(total_workload, assigned);
                    Ok(())
                })
            },
        )
        .unwrap();
}

#[test]
fn prop_manual_assignment_only_exceeds_capacity_by_manual_count() {
    runner(24)
        .run(
            &(
                prop::collection::vec(any::<EditorSpec>(), 4..=4),
                prop::collection::vec(any::<AssignmentRequest>(), 1..10),
            ),
            |(editors, requests)| {
                runtime().block_on(async {
                    let pipeline = pipeline_with_editors(&editors).await;
                    let ids = waiting_workflows(&pipeline, requests.len()).await;

                    let mut manual: HashMap<EditorId, u32> = HashMap::new();
                    let mut assigned = 0usize;
                    for (id, request) in ids.iter().zip(&requests) {
                        let editor_id = match request {
                            AssignmentRequest::Auto => None,
                            AssignmentRequest::Manual(n) => Some(EditorId::new(format!("ed-{}", n))),
                        };
                        if let Ok(assignment) = pipeline.queue.assign_editor(*id, editor_id).await {
                            assigned += 1;
                            if assignment.manual {
                                *manual.entry(assignment.editor_id).or_insert(0) += 1;
                            }
                        }
                    }

                    let mut total_workload = 0usize;
                    for editor in pipeline.editors.list().await {
                        let forced = manual.get(&editor.id).copied().unwrap_or(0);
                        prop_assert!(editor.current_workload <= editor.max_workload + forced);
                        total_workload += editor.current_workload as usize;
                    }
                    prop_assert_eq!(total_workload, assigned);
                    Ok(())
                })
            },
        )
        .unwrap();
}

#[test]
fn prop_command_sequences_keep_workflow_consistent() {
    runner(32)
        .run(
            &prop::collection::vec(any::<Command>(), 1..25),
            |commands| {
                runtime().block_on(async {
                    let pipeline = pipeline();
                    let workflow = create(&pipeline, "article-seq", Priority::High).await;
                    let id = workflow.id;

                    for command in commands {
                        let _ = match command {
                            Command::Advance(pass) => {
                                let request = if pass { passing() } else { failing() };
                                pipeline.engine.advance(id, request).await.map(|r| r.workflow)
                            }
                            Command::Pause => pipeline.engine.pause(id, "hold", Actor::System).await,
                            Command::Resume => pipeline.engine.resume(id, Actor::System).await,
                            Command::Rollback => pipeline.engine.rollback(id, "redo", Actor::System).await,
                            Command::Cancel => pipeline.engine.cancel(id, "dropped", Actor::System).await,
                            Command::Escalate => {
                                pipeline
                                    .engine
                                    .submit_for_human_review(id, None, Actor::System)
                                    .await
                            }
                        };

                        let current = pipeline.engine.get_workflow(id).await.unwrap();
                        if current.current_state == WorkflowState::Paused {
                            prop_assert!(current.previous_state.is_some());
                        }
                        prop_assert!(current.retry_count <= current.max_retries);
                        if current.current_state == WorkflowState::Failed {
                            prop_assert_eq!(current.retry_count, current.max_retries);
                        }
                        prop_assert!((0.0..=100.0).contains(&current.completion_percentage));

                        let transitions = pipeline.engine.transitions(id).await.unwrap();
                        let last = transitions
                            .last()
                            .ok_or_else(|| TestCaseError::fail("workflow has no transitions"))?;
                        prop_assert_eq!(last.to_state, current.current_state);

                        let open_steps = pipeline
                            .engine
                            .steps(id)
                            .await
                            .unwrap()
                            .into_iter()
                            .filter(|step| step.status.is_open())
                            .count();
                        prop_assert!(open_steps <= 1, "{} open steps", open_steps);
                    }
                    Ok(())
                })
            },
        )
        .unwrap();
}
