//! # branch_coverage
//!
//! A small library for tallying branch markers found in trace output and
//! rendering a coverage report over a fixed set of 18 branches.
//!
//! A line reports a branch when it is longer than 35 bytes and carries the
//! marker `#0` at byte offsets 32 and 33. The decimal digits starting at
//! offset 33 name the branch, so `#013` reports branch 13 and `#09` reports
//! branch 9.
//!
//! ## Example Usage
//!
//! ```no_run
//! use branch_coverage::{OutOfRangePolicy, Scanner};
//!
//! // Tallying a trace file
//! let table = branch_coverage::from_file("trace.log").unwrap();
//! println!("{}% covered", table.coverage_percent());
//!
//! // Rejecting identifiers outside 1..=18
//! let outcome = Scanner::new()
//!     .policy(OutOfRangePolicy::Reject)
//!     .scan(std::io::stdin().lock())
//!     .unwrap();
//!
//! // Writing the report
//! branch_coverage::to_writer(&outcome.table, &mut std::io::stdout()).unwrap();
//! ```

use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

/// Number of branches tracked by a [`BranchTable`].
pub const BRANCH_COUNT: usize = 18;

/// A specialized `Result` type for branch coverage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that can occur while scanning input or writing a report.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred while opening input or writing the report.
    Io(io::Error),
    /// A marker line named a branch outside `1..=18` and the scanner was
    /// configured with [`OutOfRangePolicy::Reject`].
    OutOfRangeBranch {
        /// 1-based line number of the offending line.
        line: usize,
        /// The identifier parsed from the marker.
        value: u64,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::OutOfRangeBranch { line, value } => write!(
                f,
                "Branch identifier {value} on line {line} is outside 1..={BRANCH_COUNT}"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Constants used throughout the library.
mod consts {
    /// Lines of this length or shorter never carry a marker.
    pub(crate) const SHORT_LINE_LEN: usize = 35;
    pub(crate) const MARKER_OFFSET: usize = 32;
    pub(crate) const DIGITS_OFFSET: usize = 33;
    pub(crate) const DETAILS_HEADER: &str = "Coverage details : ";
    pub(crate) const NOT_REACHED_HEADER: &str = "Branch(es) not reached : ";
    pub(crate) const COVERAGE_PREFIX: &str = "The code is covered at ";
    pub(crate) const SIGNIFICANT_DIGITS: i32 = 6;
}

/// Identifier of one tracked branch, always within `1..=18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchId(u8);

impl BranchId {
    /// Returns the identifier for `value`, or `None` if it is not a tracked branch.
    pub fn new(value: u64) -> Option<Self> {
        if (1..=BRANCH_COUNT as u64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Returns the numeric value of the identifier.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Iterates over every tracked branch in ascending order.
    pub fn all() -> impl Iterator<Item = BranchId> {
        (1..=BRANCH_COUNT as u8).map(BranchId)
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl Display for BranchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence table recording which branches were reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchTable {
    reached: [bool; BRANCH_COUNT],
}

impl BranchTable {
    /// Creates a table with every branch unreached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` as reached. Returns `true` if it was not reached before.
    pub fn mark(&mut self, id: BranchId) -> bool {
        !std::mem::replace(&mut self.reached[id.index()], true)
    }

    /// Checks whether `id` has been reached.
    pub fn is_reached(&self, id: BranchId) -> bool {
        self.reached[id.index()]
    }

    /// Number of reached branches.
    pub fn reached_count(&self) -> usize {
        self.reached.iter().filter(|&&r| r).count()
    }

    /// Iterates over every branch in ascending order with its reached flag.
    pub fn iter(&self) -> impl Iterator<Item = (BranchId, bool)> + '_ {
        BranchId::all().map(move |id| (id, self.is_reached(id)))
    }

    /// Iterates over the branches not reached, in ascending order.
    pub fn unreached(&self) -> impl Iterator<Item = BranchId> + '_ {
        BranchId::all().filter(move |&id| !self.is_reached(id))
    }

    /// Percentage of reached branches, `reached / 18.0 * 100.0`.
    pub fn coverage_percent(&self) -> f64 {
        self.reached_count() as f64 / BRANCH_COUNT as f64 * 100.0
    }

    /// Returns a displayable coverage report for this table.
    pub fn report(&self) -> Report<'_> {
        Report { table: self }
    }
}

/// The text coverage report for a [`BranchTable`].
///
/// Lists every branch with its status, then the unreached branches, then the
/// coverage percentage formatted by [`format_percentage`].
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    table: &'a BranchTable,
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", consts::DETAILS_HEADER)?;
        for (id, reached) in self.table.iter() {
            writeln!(f, "Branch {id} => {reached}")?;
        }

        writeln!(f)?;
        writeln!(f, "{}", consts::NOT_REACHED_HEADER)?;
        for id in self.table.unreached() {
            writeln!(f, "Branch {id}")?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "{}{}%",
            consts::COVERAGE_PREFIX,
            format_percentage(self.table.coverage_percent())
        )?;
        writeln!(f)
    }
}

/// Formats a percentage with six significant digits, dropping trailing
/// zeros and a trailing decimal point (`27.7778`, `5.55556`, `50`, `100`).
///
/// Values are expected in `0.0..=100.0`; no exponent form is produced.
pub fn format_percentage(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (consts::SIGNIFICANT_DIGITS - 1 - magnitude).max(0) as usize;
    let fixed = format!("{value:.decimals$}");
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

/// Extracts the raw branch identifier from a trace line.
///
/// Returns `None` unless the line is longer than 35 bytes with `#` at offset
/// 32 and `0` at offset 33. Otherwise the leading decimal integer starting at
/// offset 33 is returned; leading zeros do not change its value and a run of
/// digits too large for `u64` saturates. The result is not range-checked.
pub fn try_extract_branch_id(line: impl AsRef<[u8]>) -> Option<u64> {
    let line = line.as_ref();
    if line.len() <= consts::SHORT_LINE_LEN
        || line[consts::MARKER_OFFSET] != b'#'
        || line[consts::DIGITS_OFFSET] != b'0'
    {
        return None;
    }
    Some(parse_leading_decimal(&line[consts::DIGITS_OFFSET..]))
}

fn parse_leading_decimal(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}

/// How the scanner treats a marker whose identifier is outside `1..=18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfRangePolicy {
    /// Skip the line and keep scanning.
    #[default]
    Ignore,
    /// Stop with [`Error::OutOfRangeBranch`].
    Reject,
}

/// Result of inspecting a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line carries no marker.
    Ignored,
    /// The line reported a tracked branch.
    Reached(BranchId),
    /// The line carries a marker naming an untracked identifier.
    OutOfRange(u64),
}

/// Counters collected during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStats {
    /// Lines read from the input.
    pub lines: usize,
    /// Lines carrying the marker, whether in range or not.
    pub markers: usize,
    /// Marker lines skipped because the identifier was out of range.
    pub out_of_range: usize,
}

/// The table and counters produced by [`Scanner::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    pub table: BranchTable,
    pub stats: ScanStats,
}

/// Line scanner that tallies branch markers into a [`BranchTable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    policy: OutOfRangePolicy,
}

impl Scanner {
    /// Creates a scanner that ignores out-of-range identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the policy for identifiers outside `1..=18`.
    pub fn policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inspects one line (without its terminator) and updates `table`.
    ///
    /// `line_no` is only used for diagnostics and errors.
    ///
    /// # Errors
    /// Returns `OutOfRangeBranch` under [`OutOfRangePolicy::Reject`].
    pub fn scan_line(
        &self,
        table: &mut BranchTable,
        line_no: usize,
        line: &[u8],
    ) -> Result<LineOutcome> {
        let Some(value) = try_extract_branch_id(line) else {
            return Ok(LineOutcome::Ignored);
        };

        match BranchId::new(value) {
            Some(id) => {
                if table.mark(id) {
                    debug!(line = line_no, branch = id.get(), "branch reached");
                }
                Ok(LineOutcome::Reached(id))
            }
            None => match self.policy {
                OutOfRangePolicy::Ignore => {
                    warn!(line = line_no, value, "ignoring out-of-range branch identifier");
                    Ok(LineOutcome::OutOfRange(value))
                }
                OutOfRangePolicy::Reject => Err(Error::OutOfRangeBranch {
                    line: line_no,
                    value,
                }),
            },
        }
    }

    /// Reads `reader` to the end and tallies every marker line.
    ///
    /// A read failure part-way through ends the scan like end-of-stream;
    /// the lines read so far are kept.
    #[instrument(skip_all, fields(policy = ?self.policy))]
    pub fn scan<R: Read>(&self, reader: R) -> Result<ScanOutcome> {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let mut outcome = ScanOutcome::default();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "input read failed, treating as end of stream");
                    break;
                }
            }
            outcome.stats.lines += 1;

            let content = line.strip_suffix(b"\n").unwrap_or(line.as_slice());
            match self.scan_line(&mut outcome.table, outcome.stats.lines, content)? {
                LineOutcome::Ignored => {}
                LineOutcome::Reached(_) => outcome.stats.markers += 1,
                LineOutcome::OutOfRange(_) => {
                    outcome.stats.markers += 1;
                    outcome.stats.out_of_range += 1;
                }
            }
        }

        info!(
            lines = outcome.stats.lines,
            markers = outcome.stats.markers,
            out_of_range = outcome.stats.out_of_range,
            reached = outcome.table.reached_count(),
            "scan complete"
        );
        Ok(outcome)
    }
}

/// Tallies branch markers from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<BranchTable> {
    from_reader(File::open(path)?)
}

/// Tallies branch markers from any reader, ignoring out-of-range identifiers.
pub fn from_reader<R: Read>(reader: R) -> Result<BranchTable> {
    Scanner::new().scan(reader).map(|outcome| outcome.table)
}

/// Writes the coverage report for `table` to any writer.
pub fn to_writer<W: Write>(table: &BranchTable, writer: &mut W) -> Result<()> {
    write!(writer, "{}", table.report())?;
    Ok(())
}

/// Renders the coverage report for `table` as a string.
pub fn render(table: &BranchTable) -> String {
    table.report().to_string()
}
