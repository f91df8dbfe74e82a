use std::ops::Range;

/// Offsets of each block in the flat decision vector for a horizon of `N` steps.
///
/// The six state blocks hold `N` values each, followed by the two actuator blocks with `N - 1`
/// values each. Constraint residuals reuse the state block offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableLayout {
    pub N: usize,
    pub x: usize,
    pub y: usize,
    pub psi: usize,
    pub v: usize,
    pub cte: usize,
    pub epsi: usize,
    pub delta: usize,
    pub a: usize,
}

impl VariableLayout {
    pub fn new(N: usize) -> VariableLayout {
        assert!(N >= 2, "horizon must have at least two steps, got {}", N);
        VariableLayout {
            N,
            x: 0,
            y: N,
            psi: 2 * N,
            v: 3 * N,
            cte: 4 * N,
            epsi: 5 * N,
            delta: 6 * N,
            a: 7 * N - 1,
        }
    }

    pub fn n_vars(&self) -> usize {
        8 * self.N - 2
    }

    pub fn n_constraints(&self) -> usize {
        6 * self.N
    }

    /// Start of each state block in state component order.
    pub fn state_offsets(&self) -> [usize; 6] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn states(&self) -> Range<usize> {
        self.x..self.delta
    }

    pub fn x_range(&self) -> Range<usize> {
        self.x..self.y
    }

    pub fn y_range(&self) -> Range<usize> {
        self.y..self.psi
    }

    pub fn delta_range(&self) -> Range<usize> {
        self.delta..self.a
    }

    pub fn a_range(&self) -> Range<usize> {
        self.a..self.n_vars()
    }

    /// Blocks of the decision vector with their lengths, in order.
    pub fn blocks(&self) -> [Range<usize>; 8] {
        let [x, y, psi, v, cte, epsi] = self.state_offsets();
        [
            x..y,
            y..psi,
            psi..v,
            v..cte,
            cte..epsi,
            epsi..self.delta,
            self.delta_range(),
            self.a_range(),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets_for_ten_steps() {
        let l = VariableLayout::new(10);
        assert_eq!(l.state_offsets(), [0, 10, 20, 30, 40, 50]);
        assert_eq!(l.delta, 60);
        assert_eq!(l.a, 69);
        assert_eq!(l.n_vars(), 78);
        assert_eq!(l.n_constraints(), 60);
        assert_eq!(l.delta_range().len(), 9);
        assert_eq!(l.a_range().len(), 9);
    }

    #[test]
    fn blocks_are_contiguous() {
        for N in 2..30 {
            let l = VariableLayout::new(N);
            let blocks = l.blocks();
            assert_eq!(blocks[0].start, 0);
            for pair in blocks.windows(2) {
                assert!(pair[0].start < pair[0].end);
                assert_eq!(pair[0].end, pair[1].start);
            }
            assert_eq!(blocks[7].end, l.n_vars());
            assert_eq!(l.n_vars(), N * 6 + (N - 1) * 2);
            assert_eq!(l.states().len(), l.n_constraints());
        }
    }

    #[test]
    #[should_panic(expected = "at least two steps")]
    fn single_step_horizon_panics() {
        VariableLayout::new(1);
    }
}
