//! Stress tests for the metadata store.
//!
//! These tests verify behavior under heavy load and concurrent access.

use crate::fixtures::TestProject;
use cvsync_codec::ResourceSyncInfo;
use cvsync_core::ResourcePath;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of bound folders to spread files over.
    pub folders: usize,
    /// Operations grouped under one outer store operation.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            folders: 16,
            batch_size: 100,
        }
    }
}

/// Binds the folders a stress run writes into.
pub fn prepare_folders(project: &TestProject, config: &StressConfig) -> Vec<ResourcePath> {
    (0..config.folders.max(1))
        .map(|i| project.bind_folder(&format!("stress{}", i)))
        .collect()
}

fn record_for(folders: &[ResourcePath], i: usize) -> (ResourcePath, ResourceSyncInfo) {
    let folder = &folders[i % folders.len()];
    let name = format!("f{}.c", i % 997);
    let revision = format!("1.{}", i % 50 + 1);
    (folder.join(&name), ResourceSyncInfo::new(name, revision, None))
}

/// Run a sequential write stress test, one store operation per write.
pub fn stress_sequential_writes(project: &TestProject, config: &StressConfig) -> StressTestResult {
    let folders = prepare_folders(project, config);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let (file, info) = record_for(&folders, i);
        match project.store.set_resource_sync(&file, info) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a batched write stress test, committing once per batch.
pub fn stress_batched_writes(project: &TestProject, config: &StressConfig) -> StressTestResult {
    let folders = prepare_folders(project, config);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let batch_size = config.batch_size.max(1);
    let mut i = 0;
    while i < config.operations {
        let op = project.store.begin_operation();
        let end = (i + batch_size).min(config.operations);
        for n in i..end {
            let (file, info) = record_for(&folders, n);
            match project.store.set_resource_sync(&file, info) {
                Ok(()) => successful += 1,
                Err(_) => failed += 1,
            }
        }
        if op.end().is_err() {
            failed += 1;
        }
        i = end;
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed read/write/delete stress test.
pub fn stress_mixed_operations(project: &TestProject, config: &StressConfig) -> StressTestResult {
    let folders = prepare_folders(project, config);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let (file, info) = record_for(&folders, i);

        let result = if i % 3 == 0 {
            // Write (33%)
            project.store.set_resource_sync(&file, info)
        } else if i % 3 == 1 {
            // Read (33%)
            project.store.resource_sync(&file).map(|_| ())
        } else {
            // Delete (33%)
            project.store.delete_resource_sync(&file)
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run concurrent writers, each on its own folders.
pub fn stress_concurrent_writes(project: &TestProject, config: &StressConfig) -> StressTestResult {
    let folders = prepare_folders(project, config);
    let threads = config.threads.max(1);
    let ops_per_thread = config.operations / threads;

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..threads {
            let folders = &folders;
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                for n in 0..ops_per_thread {
                    let (file, info) = record_for(folders, n * threads + t);
                    match project.store.set_resource_sync(&file, info) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
