use core::ops::Range;

pub(crate) trait SplitAtHalf: Sized {
    fn split_at_half(&self) -> (Self, Self);
}

impl SplitAtHalf for Range<u8> {
    #[inline]
    fn split_at_half(&self) -> (Self, Self) {
        let len = self
            .end
            .checked_sub(self.start)
            .expect("SplitAtHalf::split_at_half");
        let mid = self.start + len / 2;
        (self.start..mid, mid..self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_cover_the_range() {
        assert_eq!((0u8..10).split_at_half(), (0..5, 5..10));
        assert_eq!((5u8..10).split_at_half(), (5..7, 7..10));
        assert_eq!((3u8..4).split_at_half(), (3..3, 3..4));
    }
}
