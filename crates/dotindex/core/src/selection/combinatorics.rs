// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Lexicographic combinations and permutations over slices, in input order.

/// All `k`-element combinations of `items`.
pub fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k > n {
        return Vec::new();
    }

    let mut result = Vec::new();
    let mut positions: Vec<usize> = (0..k).collect();
    loop {
        result.push(positions.iter().map(|&i| items[i].clone()).collect());

        // Rightmost position that can still advance
        let Some(i) = (0..k).rev().find(|&i| positions[i] != i + n - k) else {
            return result;
        };
        positions[i] += 1;
        for j in i + 1..k {
            positions[j] = positions[j - 1] + 1;
        }
    }
}

/// All ordered `k`-element arrangements of distinct elements of `items`.
pub fn permutations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    fn extend<T: Clone>(items: &[T], k: usize, used: &mut Vec<bool>, current: &mut Vec<T>, result: &mut Vec<Vec<T>>) {
        if current.len() == k {
            result.push(current.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            current.push(items[i].clone());
            extend(items, k, used, current, result);
            current.pop();
            used[i] = false;
        }
    }

    let mut result = Vec::new();
    if k > items.len() {
        return result;
    }
    extend(items, k, &mut vec![false; items.len()], &mut Vec::with_capacity(k), &mut result);
    result
}
