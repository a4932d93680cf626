use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, Lines};
use std::marker::PhantomData;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::pileup::binner::BinPairRequest;

///
/// One normalized observation from the sparse contact stream.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub bin1: u64,
    pub bin2: u64,
    pub value: f64,
}

impl FromStr for ContactRecord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            anyhow::bail!("Error parsing contact record line: {}", s)
        }

        Ok(ContactRecord {
            bin1: parts[0].parse::<u64>()?,
            bin2: parts[1].parse::<u64>()?,
            value: parts[2].parse::<f64>()?,
        })
    }
}

/// Pair identity: the two originating peak labels.
pub type PairKey = (String, String);

///
/// Running per-offset statistics for one peak pair. Offsets are the `(dx, dy)`
/// displacement in bins from the pair's center bins; each holds a running
/// `(sum, count)` so the final cell value is the mean of its observations.
///
#[derive(Debug, Default, Clone)]
pub struct PairAccumulator {
    cells: HashMap<(i64, i64), (f64, u64)>,
}

impl PairAccumulator {
    pub fn observe(&mut self, dx: i64, dy: i64, value: f64) {
        let cell = self.cells.entry((dx, dy)).or_insert((0.0, 0));
        cell.0 += value;
        cell.1 += 1;
    }

    /// Mean observed value at an offset; 0.0 where nothing was observed.
    pub fn mean(&self, dx: i64, dy: i64) -> f64 {
        match self.cells.get(&(dx, dy)) {
            Some((sum, count)) if *count > 0 => sum / *count as f64,
            _ => 0.0,
        }
    }

    pub fn merge(&mut self, other: PairAccumulator) {
        for (offset, (sum, count)) in other.cells {
            let cell = self.cells.entry(offset).or_insert((0.0, 0));
            cell.0 += sum;
            cell.1 += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn offsets(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.cells.keys().copied()
    }
}

trait BinPairKeyed {
    fn key(&self) -> (u64, u64);
}

impl BinPairKeyed for BinPairRequest {
    fn key(&self) -> (u64, u64) {
        (self.bin1, self.bin2)
    }
}

impl BinPairKeyed for ContactRecord {
    fn key(&self) -> (u64, u64) {
        (self.bin1, self.bin2)
    }
}

///
/// Line-by-line reader over a sorted record stream that verifies keys never
/// decrease. Unsorted input would corrupt the merge-join silently, so a
/// violation is an error naming the stream and line.
///
struct SortedStream<R: BufRead, T> {
    lines: Lines<R>,
    lineno: usize,
    last_key: Option<(u64, u64)>,
    what: &'static str,
    _marker: PhantomData<T>,
}

impl<R, T> SortedStream<R, T>
where
    R: BufRead,
    T: FromStr<Err = anyhow::Error> + BinPairKeyed,
{
    fn new(reader: R, what: &'static str) -> Self {
        SortedStream {
            lines: reader.lines(),
            lineno: 0,
            last_key: None,
            what,
            _marker: PhantomData,
        }
    }

    fn next_record(&mut self) -> Result<Option<T>> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.lineno += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: T = line
                .parse()
                .with_context(|| format!("Failed to parse {} stream line {}", self.what, self.lineno))?;

            let key = record.key();
            if let Some(last) = self.last_key {
                if key < last {
                    anyhow::bail!(
                        "The {} stream is not sorted: key {:?} follows {:?} at line {}",
                        self.what,
                        key,
                        last,
                        self.lineno
                    )
                }
            }
            self.last_key = Some(key);

            return Ok(Some(record));
        }

        Ok(None)
    }
}

///
/// Sorted merge-join of one chromosome's request and contact streams.
///
/// Both streams arrive sorted ascending by `(bin1, bin2)`. A sliding deque of
/// "active" requests tracks those whose window footprint can still overlap
/// the current contact row: a request is admitted once
/// `request.bin1 <= contact.bin1 + flank_bins` and retired once
/// `request.bin1 + flank_bins < contact.bin1`. Each contact landing inside an
/// active request's footprint contributes its value at the relative offset
/// `(bin1 - request.bin1, bin2 - request.bin2)`; contacts matching nothing
/// are dropped. An empty contact stream yields an empty result.
///
/// Memory stays proportional to the active requests plus the pairs actually
/// observed, never to the chromosome's bin count.
///
pub fn aggregate_sorted_streams<R, C>(
    requests: R,
    contacts: C,
    flank_bins: u64,
) -> Result<HashMap<PairKey, PairAccumulator>>
where
    R: BufRead,
    C: BufRead,
{
    let mut requests = SortedStream::<R, BinPairRequest>::new(requests, "request");
    let mut contacts = SortedStream::<C, ContactRecord>::new(contacts, "contact");

    let mut active: VecDeque<BinPairRequest> = VecDeque::new();
    let mut pending = requests.next_record()?;
    let mut accumulators: HashMap<PairKey, PairAccumulator> = HashMap::new();

    while let Some(contact) = contacts.next_record()? {
        while let Some(request) = pending.as_ref() {
            if request.bin1 <= contact.bin1.saturating_add(flank_bins) {
                active.push_back(pending.take().unwrap());
                pending = requests.next_record()?;
            } else {
                break;
            }
        }

        while let Some(front) = active.front() {
            if front.bin1 + flank_bins < contact.bin1 {
                active.pop_front();
            } else {
                break;
            }
        }

        for request in &active {
            let dx = contact.bin1 as i64 - request.bin1 as i64;
            let dy = contact.bin2 as i64 - request.bin2 as i64;
            if dx.unsigned_abs() <= flank_bins && dy.unsigned_abs() <= flank_bins {
                accumulators
                    .entry((request.label1.clone(), request.label2.clone()))
                    .or_default()
                    .observe(dx, dy, contact.value);
            }
        }
    }

    Ok(accumulators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::BufReader;

    fn reader(content: &str) -> BufReader<&[u8]> {
        BufReader::new(content.as_bytes())
    }

    #[rstest]
    fn test_merge_join_averages_repeated_offsets() {
        // single pair centered at bins (10, 40), flank 2
        let requests = "10\t40\tchr1:100000-110000\tchr1:400000-410000\n";
        let contacts = "10\t40\t4.0\n10\t40\t6.0\n11\t39\t2.0\n";

        let accumulators =
            aggregate_sorted_streams(reader(requests), reader(contacts), 2).unwrap();

        assert_eq!(accumulators.len(), 1);
        let acc = &accumulators[&(
            "chr1:100000-110000".to_string(),
            "chr1:400000-410000".to_string(),
        )];
        assert_eq!(acc.mean(0, 0), 5.0);
        assert_eq!(acc.mean(1, -1), 2.0);
        assert_eq!(acc.mean(-1, 1), 0.0);
    }

    #[rstest]
    fn test_merge_join_unmatched_contacts_dropped() {
        let requests = "10\t40\ta\tb\n";
        let contacts = "100\t140\t4.0\n";

        let accumulators =
            aggregate_sorted_streams(reader(requests), reader(contacts), 2).unwrap();

        assert!(accumulators.is_empty());
    }

    #[rstest]
    fn test_merge_join_empty_contact_stream() {
        let requests = "10\t40\ta\tb\n";

        let accumulators = aggregate_sorted_streams(reader(requests), reader(""), 2).unwrap();

        assert!(accumulators.is_empty());
    }

    #[rstest]
    fn test_merge_join_multiple_overlapping_requests() {
        // two pairs with overlapping footprints around the same contact row
        let requests = "10\t40\ta1\ta2\n11\t41\tb1\tb2\n";
        let contacts = "11\t40\t3.0\n";

        let accumulators =
            aggregate_sorted_streams(reader(requests), reader(contacts), 2).unwrap();

        assert_eq!(accumulators.len(), 2);
        assert_eq!(accumulators[&("a1".to_string(), "a2".to_string())].mean(1, 0), 3.0);
        assert_eq!(
            accumulators[&("b1".to_string(), "b2".to_string())].mean(0, -1),
            3.0
        );
    }

    #[rstest]
    fn test_merge_join_retires_passed_requests() {
        // second contact row is far past the first request's footprint
        let requests = "10\t40\ta1\ta2\n500\t540\tb1\tb2\n";
        let contacts = "10\t40\t1.0\n500\t540\t2.0\n";

        let accumulators =
            aggregate_sorted_streams(reader(requests), reader(contacts), 2).unwrap();

        assert_eq!(accumulators.len(), 2);
        assert_eq!(accumulators[&("a1".to_string(), "a2".to_string())].mean(0, 0), 1.0);
        assert_eq!(accumulators[&("b1".to_string(), "b2".to_string())].mean(0, 0), 2.0);
    }

    #[rstest]
    #[case("10\t40\ta\tb\n5\t40\tc\td\n", "10\t40\t1.0\n")]
    #[case("5\t40\ta\tb\n", "10\t40\t1.0\n9\t39\t1.0\n")]
    fn test_merge_join_rejects_unsorted_streams(#[case] requests: &str, #[case] contacts: &str) {
        let result = aggregate_sorted_streams(reader(requests), reader(contacts), 2);

        assert!(result.is_err());
    }

    #[rstest]
    fn test_accumulator_merge() {
        let mut left = PairAccumulator::default();
        left.observe(0, 0, 4.0);
        let mut right = PairAccumulator::default();
        right.observe(0, 0, 6.0);
        right.observe(1, 1, 1.0);

        left.merge(right);

        assert_eq!(left.mean(0, 0), 5.0);
        assert_eq!(left.mean(1, 1), 1.0);
    }
}
