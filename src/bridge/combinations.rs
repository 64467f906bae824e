/// Unordered index pairs `(i, j)` with `i < j < n`, in increasing order.
///
/// Iterative, so large inputs never recurse.
#[derive(Debug, Clone)]
pub struct Pairs {
    n: usize,
    i: usize,
    j: usize,
}

impl Pairs {
    pub fn new(n: usize) -> Self {
        Self { n, i: 0, j: 1 }
    }
}

impl Iterator for Pairs {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.i + 1 < self.n {
            if self.j < self.n {
                let pair = (self.i, self.j);
                self.j += 1;
                return Some(pair);
            }
            self.i += 1;
            self.j = self.i + 1;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.i + 1 >= self.n {
            return (0, Some(0));
        }
        // rest of the current row plus every full row after it
        let current = self.n.saturating_sub(self.j);
        let rows_after = self.n - self.i - 1;
        let remaining = current + rows_after * (rows_after - 1) / 2;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pairs {}

/// Pairs of items from `items`, borrowed.
pub fn pairs_of<T>(items: &[T]) -> impl Iterator<Item = (&T, &T)> {
    Pairs::new(items.len()).map(move |(i, j)| (&items[i], &items[j]))
}
