//! Plain-text percentile distribution reports.
//!
//! The classic format is the one produced by other HdrHistogram implementations' "output
//! percentile distribution" and consumed by their plotting tools:
//!
//! ```text
//!        Value     Percentile TotalCount 1/(1-Percentile)
//!
//!        1.000 0.000000000000          1           1.00
//!       ...
//! #[Mean    =       50.500, StdDeviation   =       28.866]
//! #[Max     =      100.000, Total count    =          100]
//! #[Buckets =            1, SubBuckets     =         2048]
//! ```

use std::io;

use crate::{Counter, Histogram};

/// Layout of a percentile distribution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Fixed-width columns with a `#[...]` statistics footer.
    Classic,
    /// Comma separated values with a quoted header row and no footer.
    Csv,
}

/// Write the percentile distribution of `hist` to `writer`.
///
/// Values are divided by `value_scale` before printing (e.g. 1000.0 to show microsecond
/// recordings as milliseconds). Percentile steps follow `Histogram::iter_percentiles` with
/// `ticks_per_half_distance`.
///
/// If the histogram's counts have overflowed the percentiles would be meaningless, so only a
/// note saying so is written.
///
/// ```
/// use hdr_histogram::Histogram;
/// use hdr_histogram::output::{percentiles_output, OutputFormat};
///
/// let mut h = Histogram::<u32>::new_with_max(10_000, 3).unwrap();
/// for v in 1..=100 {
///     h.record(v).unwrap();
/// }
/// let mut out = Vec::new();
/// percentiles_output(&h, &mut out, 5, 1.0, OutputFormat::Classic).unwrap();
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.contains("Total count    =          100]"));
/// ```
pub fn percentiles_output<T: Counter, W: io::Write>(
    hist: &Histogram<T>,
    writer: &mut W,
    ticks_per_half_distance: u32,
    value_scale: f64,
    format: OutputFormat,
) -> io::Result<()> {
    if hist.has_overflowed() {
        return writeln!(writer, "# Histogram counts indicate OVERFLOW values");
    }

    let digits = usize::from(hist.sigfig());
    match format {
        OutputFormat::Classic => {
            writeln!(
                writer,
                "{:>12} {:>14} {:>10} {:>14}\n",
                "Value", "Percentile", "TotalCount", "1/(1-Percentile)"
            )?;
        }
        OutputFormat::Csv => {
            writeln!(
                writer,
                "\"Value\",\"Percentile\",\"TotalCount\",\"1/(1-Percentile)\""
            )?;
        }
    }

    for v in hist.iter_percentiles(ticks_per_half_distance) {
        let value = v.value_iterated_to() as f64 / value_scale;
        let quantile = v.quantile_iterated_to();
        let total = v.total_count_to_this_value();
        match (format, v.is_last()) {
            (OutputFormat::Classic, false) => writeln!(
                writer,
                "{:>12.prec$} {:>2.12} {:>10} {:>14.2}",
                value,
                quantile,
                total,
                1.0 / (1.0 - quantile),
                prec = digits
            )?,
            (OutputFormat::Classic, true) => writeln!(
                writer,
                "{:>12.prec$} {:>2.12} {:>10}",
                value,
                quantile,
                total,
                prec = digits
            )?,
            (OutputFormat::Csv, false) => writeln!(
                writer,
                "{:.prec$},{:.12},{},{:.2}",
                value,
                quantile,
                total,
                1.0 / (1.0 - quantile),
                prec = digits
            )?,
            (OutputFormat::Csv, true) => writeln!(
                writer,
                "{:.prec$},{:.12},{},Infinity",
                value,
                quantile,
                total,
                prec = digits
            )?,
        }
    }

    if format == OutputFormat::Classic {
        writeln!(
            writer,
            "#[Mean    = {:>12.prec$}, StdDeviation   = {:>12.prec$}]",
            hist.mean() / value_scale,
            hist.stdev() / value_scale,
            prec = digits
        )?;
        writeln!(
            writer,
            "#[Max     = {:>12.prec$}, Total count    = {:>12}]",
            hist.max() as f64 / value_scale,
            hist.len(),
            prec = digits
        )?;
        writeln!(
            writer,
            "#[Buckets = {:>12}, SubBuckets     = {:>12}]",
            hist.buckets(),
            hist.sub_buckets()
        )?;
    }

    Ok(())
}
