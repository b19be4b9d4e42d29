/*!
Reporters et taggers factices pour tester le fan-in des sondes.
*/

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use symbion_collector::producer::{Reporter, Tagger};
use symbion_report::Report;

/// Always returns the same report.
pub struct StaticReporter {
    name: String,
    report: Report,
}

impl StaticReporter {
    pub fn new(name: impl Into<String>, report: Report) -> Self {
        Self { name: name.into(), report }
    }
}

impl Reporter for StaticReporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn report(&self) -> Result<Report> {
        Ok(self.report.clone())
    }
}

pub struct FailingReporter;

impl Reporter for FailingReporter {
    fn name(&self) -> &str {
        "failing"
    }

    fn report(&self) -> Result<Report> {
        Err(anyhow!("reporter indisponible"))
    }
}

/// Passes reports through untouched and counts the calls.
#[derive(Default)]
pub struct CountingTagger {
    calls: AtomicUsize,
}

impl CountingTagger {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Tagger for CountingTagger {
    fn name(&self) -> &str {
        "counting"
    }

    fn tag(&self, report: Report) -> Result<Report> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }
}

pub struct FailingTagger;

impl Tagger for FailingTagger {
    fn name(&self) -> &str {
        "failing"
    }

    fn tag(&self, _report: Report) -> Result<Report> {
        Err(anyhow!("tagger indisponible"))
    }
}
