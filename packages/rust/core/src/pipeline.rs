//! Shared assembly pipeline: spine → read → extract → classify → zone-tag.
//!
//! Both output targets consume the same [`FragmentSequence`], so the
//! front/main/back matter transitions are identical whichever document is
//! produced.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use bindery_manifest::Package;
use bindery_markup::{extract_content_region, extract_heading};
use bindery_shared::{MatterZone, Result, StructuralRole};

use crate::assembler::DocumentSerializer;
use crate::classify::classify;
use crate::report::{RunReport, SkipReason, SkippedFragment};
use crate::zone::{ZoneTracker, ZoneTransition};

/// One fragment, ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedFragment {
    /// Manifest href (relative to the package directory).
    pub href: String,
    /// Markup between the body tags.
    pub content: String,
    pub role: StructuralRole,
    /// Zone after this fragment was observed.
    pub zone: MatterZone,
    /// Transition this fragment triggers; emitted before it.
    pub transition: Option<ZoneTransition>,
    /// First heading in the content, if any.
    pub heading: Option<String>,
}

impl TaggedFragment {
    /// Last path segment of the href.
    pub fn file_name(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }
}

/// Ordered fragments plus whatever was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct FragmentSequence {
    pub fragments: Vec<TaggedFragment>,
    pub skipped: Vec<SkippedFragment>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each spine item is handled (included or skipped).
    fn fragment_processed(&self, href: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn fragment_processed(&self, _href: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Resolve the spine and load every fragment in reading order.
///
/// Missing files and files without a content region are skipped with a
/// warning; nothing here is fatal.
#[instrument(skip_all, fields(base = %package.base_dir.display()))]
pub fn collect_fragments(package: &Package, progress: &dyn ProgressReporter) -> FragmentSequence {
    let items = package.resolve_spine();
    let total = items.len();
    let mut tracker = ZoneTracker::new();
    let mut sequence = FragmentSequence::default();

    for (i, item) in items.iter().enumerate() {
        let location = package.location(item);

        let skip = |reason: SkipReason| {
            warn!(href = %item.href, %reason, "skipping fragment");
            SkippedFragment {
                href: item.href.clone(),
                reason,
            }
        };

        let loaded = if !location.is_file() {
            Err(skip(SkipReason::Missing))
        } else {
            match std::fs::read_to_string(&location) {
                Err(e) => Err(skip(SkipReason::Unreadable(e.to_string()))),
                Ok(doc) => match extract_content_region(&doc) {
                    Err(e) => Err(skip(SkipReason::NoContentRegion(e))),
                    Ok(region) => Ok(region.to_string()),
                },
            }
        };

        match loaded {
            Ok(content) => {
                let role = classify(item.file_name());
                let transition = tracker.observe(role);
                let heading = extract_heading(&content);

                if let Some(transition) = transition {
                    info!(href = %item.href, zone = %transition.target(), "entering new matter zone");
                }
                debug!(
                    href = %item.href,
                    %role,
                    zone = %tracker.current(),
                    linear = item.linear,
                    "fragment tagged"
                );

                sequence.fragments.push(TaggedFragment {
                    href: item.href.clone(),
                    content,
                    role,
                    zone: tracker.current(),
                    transition,
                    heading,
                });
            }
            Err(skipped) => sequence.skipped.push(skipped),
        }

        progress.fragment_processed(&item.href, i + 1, total);
    }

    info!(
        fragments = sequence.fragments.len(),
        skipped = sequence.skipped.len(),
        "fragments collected"
    );

    sequence
}

/// Run the shared pipeline and hand the sequence to one serializer.
#[instrument(skip_all, fields(target = serializer.target()))]
pub fn assemble(
    package: &Package,
    serializer: &mut dyn DocumentSerializer,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(serializer.target());

    progress.phase("Reading fragments");
    let sequence = collect_fragments(package, progress);
    report.fragments = sequence.fragments.len();
    report.skipped = sequence.skipped.clone();

    progress.phase("Assembling document");
    serializer.serialize(&sequence, &mut report)?;

    report.elapsed = start.elapsed();
    progress.done(&report);

    info!(
        target = %report.target,
        fragments = report.fragments,
        skipped = report.skipped.len(),
        failures = report.failures.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "assembly complete"
    );

    Ok(report)
}
