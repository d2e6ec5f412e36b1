/// One packet, or the part of it that lies on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub len: usize,
    /// `false` when the lacing ended in a 255 run, i.e. the packet
    /// continues on the next page.
    pub complete: bool,
}

/// Packet lengths of a page, rebuilt from its lacing values, with a read
/// cursor that survives across decode calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    cursor: usize,
}

impl SegmentTable {
    /// Consecutive 255 lacing values are summed into one packet; any value
    /// below 255 terminates it.
    pub fn from_lacing(lacing: &[u8]) -> Self {
        let mut segments = Vec::with_capacity(lacing.len());
        let mut len = 0;

        for &value in lacing {
            len += value as usize;
            if value < 255 {
                segments.push(Segment {
                    len,
                    complete: true,
                });
                len = 0;
            }
        }

        if lacing.last() == Some(&255) {
            segments.push(Segment {
                len,
                complete: false,
            });
        }

        Self {
            segments,
            cursor: 0,
        }
    }

    /// Sum of all segment lengths.
    pub fn payload_len(&self) -> usize {
        self.segments.iter().map(|s| s.len).sum()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn peek(&self) -> Option<Segment> {
        self.segments.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        if self.cursor < self.segments.len() {
            self.cursor += 1;
        }
    }

    /// `true` while the cursor sits on the page's first segment.
    pub fn at_first(&self) -> bool {
        self.cursor == 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.segments.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], &[])]
    #[case(&[0], &[(0, true)])]
    #[case(&[10, 20], &[(10, true), (20, true)])]
    #[case(&[255, 10], &[(265, true)])]
    #[case(&[255, 255, 0, 7], &[(510, true), (7, true)])]
    #[case(&[5, 255, 255], &[(5, true), (510, false)])]
    fn lacing_runs(#[case] lacing: &[u8], #[case] expected: &[(usize, bool)]) {
        let table = SegmentTable::from_lacing(lacing);
        let got: Vec<_> = table.segments().iter().map(|s| (s.len, s.complete)).collect();
        assert_eq!(got, expected);
        assert_eq!(
            table.payload_len(),
            lacing.iter().map(|&v| v as usize).sum::<usize>()
        );
    }

    #[test]
    fn cursor() {
        let mut table = SegmentTable::from_lacing(&[3, 4]);
        assert!(table.at_first());
        assert_eq!(
            table.peek(),
            Some(Segment {
                len: 3,
                complete: true,
            })
        );
        table.advance();
        assert!(!table.at_first());
        assert_eq!(table.peek().map(|s| s.len), Some(4));
        table.advance();
        assert!(table.is_exhausted());
        assert_eq!(table.peek(), None);
        table.advance();
        assert!(table.is_exhausted());
    }
}
