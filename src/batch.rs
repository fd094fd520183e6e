#![deny(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use crate::error::{BatchError, ColumnNotFoundError, RenderError};
use crate::grouping::group_rows;
use crate::render::{DocumentRenderer, RenderRequest};
use crate::source::load_table;
use crate::table::Table;

/// Reported before the document of an entity is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position of the entity in the batch, starting from 1.
    pub index: usize,
    pub total: usize,
    pub entity_name: String,
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Processing {}/{}: {}", self.index, self.total, self.entity_name)
    }
}

/// What happened to the document of a single entity.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    Produced(PathBuf),
    Failed(RenderError),
}

/// The summary of a whole batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionResult {
    pub success_count: usize,
    pub error_count: usize,
    pub output_directory: PathBuf,
    pub produced_paths: Vec<PathBuf>,
    pub failures: Vec<RenderError>,
}

impl ConversionResult {
    fn new(output_directory: &Path) -> ConversionResult {
        ConversionResult {
            output_directory: output_directory.to_path_buf(),
            ..ConversionResult::default()
        }
    }

    fn record(&mut self, outcome: GroupOutcome) {
        match outcome {
            GroupOutcome::Produced(output_path) => {
                self.success_count += 1;
                self.produced_paths.push(output_path);
            }
            GroupOutcome::Failed(error) => {
                self.error_count += 1;
                self.failures.push(error);
            }
        }
    }
}

/// Messages sent by the worker started with `spawn_batch`. `Finished` is always the last one.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress(ProgressEvent),
    Finished(Result<ConversionResult, BatchError>),
}

/// Renders one document per entity of the table into the output directory, which must exist.
/// A failing document is counted and logged without stopping the others.
pub fn convert_table<R, P>(
    table: &Table,
    key_column: &str,
    output_directory: &Path,
    renderer: &R,
    mut on_progress: P,
) -> Result<ConversionResult, ColumnNotFoundError>
where
    R: DocumentRenderer + ?Sized,
    P: FnMut(&ProgressEvent),
{
    let groups = group_rows(table, key_column)?;
    let total = groups.len();
    let mut conversion_result = ConversionResult::new(output_directory);
    let mut written_paths = HashSet::new();

    for (position, group) in groups.iter().enumerate() {
        let request = RenderRequest::from_group(group, table.columns());
        on_progress(&ProgressEvent {
            index: position + 1,
            total,
            entity_name: request.entity_name.clone(),
        });

        let outcome = match renderer.render(&request, output_directory) {
            Ok(output_path) => {
                if !written_paths.insert(output_path.clone()) {
                    log::warn!(
                        "The document of {:?} replaced an earlier document at {:?}",
                        request.entity_name,
                        output_path
                    );
                }
                GroupOutcome::Produced(output_path)
            }
            Err(error) => {
                log::error!("{}", error);
                GroupOutcome::Failed(error)
            }
        };
        conversion_result.record(outcome);
    }

    log::info!(
        "Converted {} entities: {} documents created, {} failed",
        total,
        conversion_result.success_count,
        conversion_result.error_count
    );

    Ok(conversion_result)
}

/// Loads the source file and converts it with `convert_table`.
pub fn run_batch<R, P>(
    source_path: &Path,
    key_column: &str,
    output_directory: &Path,
    renderer: &R,
    on_progress: P,
) -> Result<ConversionResult, BatchError>
where
    R: DocumentRenderer + ?Sized,
    P: FnMut(&ProgressEvent),
{
    let table = load_table(source_path)?;
    let conversion_result = convert_table(&table, key_column, output_directory, renderer, on_progress)?;

    Ok(conversion_result)
}

/// Runs the whole batch on a background thread, streaming its progress over the returned channel.
pub fn spawn_batch<R>(
    source_path: PathBuf,
    key_column: String,
    output_directory: PathBuf,
    renderer: R,
) -> (mpsc::Receiver<BatchEvent>, thread::JoinHandle<()>)
where
    R: DocumentRenderer + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    let worker = thread::spawn(move || {
        let progress_sender = sender.clone();
        let batch_result = run_batch(&source_path, &key_column, &output_directory, &renderer, |progress| {
            // A receiver which went away only stops the reporting, not the batch
            let _ = progress_sender.send(BatchEvent::Progress(progress.clone()));
        });
        if let Err(error) = &batch_result {
            log::error!("The batch has been aborted: {}", error);
        }
        let _ = sender.send(BatchEvent::Finished(batch_result));
    });

    (receiver, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use crate::table::CellValue;
    use std::cell::RefCell;

    /// Records the requests it receives, failing for the entities it has been told to.
    #[derive(Default)]
    struct RecordingRenderer {
        failing_entities: Vec<String>,
        requests: RefCell<Vec<(String, Vec<CellValue>)>>,
    }

    impl DocumentRenderer for RecordingRenderer {
        fn render(&self, request: &RenderRequest<'_>, output_directory: &Path) -> Result<PathBuf, RenderError> {
            self.requests.borrow_mut().push((
                request.entity_name.clone(),
                request.first_row().map(<[CellValue]>::to_vec).unwrap_or_default(),
            ));
            if self.failing_entities.contains(&request.entity_name) {
                return Err(RenderError::new(
                    request.entity_name.as_str(),
                    ContextError::with_context("Injected failure"),
                ));
            }
            Ok(output_directory.join(format!("{}.pdf", request.entity_name.to_lowercase())))
        }
    }

    fn people() -> Table {
        Table::new(
            vec!["name".into(), "age".into(), "city".into()],
            vec![
                vec![CellValue::text("Alice"), CellValue::Integer(30), CellValue::text("NY")],
                vec![CellValue::text("Bob"), CellValue::Integer(25), CellValue::text("LA")],
                vec![CellValue::text("Alice"), CellValue::Integer(31), CellValue::text("SF")],
                vec![CellValue::Empty, CellValue::Integer(50), CellValue::text("XX")],
            ],
        )
    }

    #[test]
    fn every_entity_is_rendered_once_from_its_first_row() {
        let renderer = RecordingRenderer::default();
        let mut progress_events = Vec::new();

        let conversion_result = convert_table(&people(), "name", Path::new("out"), &renderer, |progress| {
            progress_events.push(progress.clone())
        })
        .unwrap();

        assert_eq!(conversion_result.success_count, 2);
        assert_eq!(conversion_result.error_count, 0);
        assert_eq!(conversion_result.output_directory, PathBuf::from("out"));
        let requests = renderer.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0],
            (
                "Alice".to_string(),
                vec![CellValue::text("Alice"), CellValue::Integer(30), CellValue::text("NY")]
            )
        );
        assert_eq!(requests[1].0, "Bob");
        similar_asserts::assert_eq!(
            progress_events.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["Processing 1/2: Alice", "Processing 2/2: Bob"]
        );
    }

    #[test]
    fn failing_entity_does_not_stop_the_others() {
        let renderer = RecordingRenderer {
            failing_entities: vec!["Alice".into()],
            ..RecordingRenderer::default()
        };

        let conversion_result = convert_table(&people(), "name", Path::new("out"), &renderer, |_| {}).unwrap();

        assert_eq!(conversion_result.success_count, 1);
        assert_eq!(conversion_result.error_count, 1);
        assert_eq!(conversion_result.produced_paths, vec![PathBuf::from("out/bob.pdf")]);
        assert_eq!(conversion_result.failures[0].entity_name, "Alice");
    }

    #[test]
    fn colliding_file_names_are_still_counted() {
        let table = Table::new(
            vec!["name".into()],
            vec![vec![CellValue::text("Alice")], vec![CellValue::text("ALICE")]],
        );

        let conversion_result =
            convert_table(&table, "name", Path::new("out"), &RecordingRenderer::default(), |_| {}).unwrap();

        assert_eq!(conversion_result.success_count, 2);
        assert_eq!(conversion_result.produced_paths[0], conversion_result.produced_paths[1]);
    }

    #[test]
    fn missing_key_column_aborts_before_rendering() {
        let renderer = RecordingRenderer::default();

        let error = convert_table(&people(), "نام", Path::new("out"), &renderer, |_| {}).unwrap_err();

        assert_eq!(error.requested_column, "نام");
        assert!(renderer.requests.borrow().is_empty());
    }

    #[test]
    fn load_errors_abort_the_batch() {
        let directory = tempfile::tempdir().unwrap();

        let error = run_batch(
            &directory.path().join("absent.csv"),
            "name",
            directory.path(),
            &RecordingRenderer::default(),
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(error, BatchError::Load(_)));
    }

    struct FixedRenderer;

    impl DocumentRenderer for FixedRenderer {
        fn render(&self, request: &RenderRequest<'_>, output_directory: &Path) -> Result<PathBuf, RenderError> {
            Ok(output_directory.join(&request.entity_name))
        }
    }

    #[test]
    fn spawned_batch_streams_progress_then_finishes() {
        let directory = tempfile::tempdir().unwrap();
        let source_path = directory.path().join("people.csv");
        std::fs::write(&source_path, "name,age\nAlice,30\nBob,25\n").unwrap();

        let (receiver, worker) = spawn_batch(
            source_path,
            "name".into(),
            directory.path().to_path_buf(),
            FixedRenderer,
        );
        let events: Vec<BatchEvent> = receiver.iter().collect();
        worker.join().unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], BatchEvent::Progress(progress) if progress.index == 1 && progress.total == 2));
        match &events[2] {
            BatchEvent::Finished(Ok(conversion_result)) => assert_eq!(conversion_result.success_count, 2),
            other => panic!("unexpected last event {:?}", other),
        }
    }
}
