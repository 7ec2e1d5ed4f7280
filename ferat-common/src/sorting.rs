//! Iterative in-place quicksort over literal arrays

use crate::memory::Vector;

/// Sort `values` in place by a key projection, without recursion.
///
/// Partitions are kept on an explicit stack so the same backing storage can
/// be reused across many small sorts. The rightmost element of a partition
/// is chosen as pivot; elements whose key compares less than or equal to the
/// pivot's key move to the left. Ties are allowed, stability is not provided.
///
/// The stack must be empty when this is called; it is empty again when this
/// returns.
pub fn quicksort_by_key<T: Copy, K: FnMut(T) -> u32>(
    stack: &mut Vector<usize>,
    values: &mut [T],
    mut key: K,
) {
    requires!(stack.is_empty());
    if values.len() < 2 {
        return;
    }
    stack.push(0);
    stack.push(values.len() - 1);
    while !stack.is_empty() {
        // Pop off in reverse order of the pushes below.
        let high = stack.pop().unwrap();
        let low = stack.pop().unwrap();
        let pivot_key = key(values[high]);
        let mut store = low;
        for current in low..high {
            if key(values[current]) <= pivot_key {
                values.swap(store, current);
                store += 1;
            }
        }
        if store < high {
            values.swap(store, high);
        }
        // Push the two remaining partitions, unless they are trivial.
        if low + 1 < store {
            stack.push(low);
            stack.push(store - 1);
        }
        if store + 2 <= high {
            stack.push(store + 1);
            stack.push(high);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;

    fn sorted_by_key<K: FnMut(u32) -> u32>(mut values: Vec<u32>, key: K) -> Vec<u32> {
        let mut stack = Vector::new();
        quicksort_by_key(&mut stack, &mut values, key);
        assert!(stack.is_empty());
        values
    }

    #[test]
    fn sorts_by_identity() {
        assert_eq!(
            sorted_by_key(vec![5, 3, 9, 1, 1, 7], |value| value),
            vec![1, 1, 3, 5, 7, 9]
        );
    }

    #[test]
    fn sorts_reverse_sorted_input() {
        assert_eq!(
            sorted_by_key((0..64).rev().collect(), |value| value),
            (0..64).collect::<Vec<_>>()
        );
    }

    #[test]
    fn trivial_inputs() {
        assert_eq!(sorted_by_key(vec![], |value| value), vec![]);
        assert_eq!(sorted_by_key(vec![42], |value| value), vec![42]);
    }

    #[test]
    fn sorts_by_projection_with_ties() {
        // Key is the value modulo 4; equal keys may appear in any order.
        let values = sorted_by_key(vec![8, 13, 2, 7, 4, 6], |value| value % 4);
        let keys: Vec<u32> = values.iter().map(|value| value % 4).collect();
        assert_eq!(keys, vec![0, 0, 1, 2, 2, 3]);
    }

    #[test]
    fn stack_is_reusable_across_sorts() {
        let mut stack = Vector::new();
        let mut first = [Literal::new(-2), Literal::new(1), Literal::new(2)];
        quicksort_by_key(&mut stack, &mut first, |literal| literal.encoding());
        assert_eq!(first, [Literal::new(1), Literal::new(2), Literal::new(-2)]);
        let mut second = [Literal::new(9), Literal::new(-9)];
        quicksort_by_key(&mut stack, &mut second, |literal| literal.encoding());
        assert_eq!(second, [Literal::new(9), Literal::new(-9)]);
    }
}
