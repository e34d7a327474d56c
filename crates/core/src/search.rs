//! Binary search over sorted (non-decreasing) series.
//!
//! Every track resolves visibility and pointer positions through these
//! functions, so they work on any `PartialOrd` slice and never mutate it.
//! Where the browser-side API used `-1` for "no such element", these return
//! `None`.

use std::ops::Range;

/// Index of the largest element `<= needle`, or `None` if every element is
/// greater than `needle` (or the slice is empty).
pub fn search<T: PartialOrd + Copy>(haystack: &[T], needle: T) -> Option<usize> {
    search_impl(haystack, needle, 0, haystack.len())
}

fn search_impl<T: PartialOrd + Copy>(
    haystack: &[T],
    needle: T,
    i: usize,
    j: usize,
) -> Option<usize> {
    if i == j {
        return None;
    }
    if i + 1 == j {
        return (needle >= haystack[i]).then_some(i);
    }
    let mid = i + (j - i) / 2;
    if needle < haystack[mid] {
        search_impl(haystack, needle, i, mid)
    } else {
        search_impl(haystack, needle, mid, j)
    }
}

/// Smallest index range that has to be scanned to find every element equal
/// to `needle`.
///
/// When `needle` is present the result is exactly its (contiguous) run of
/// duplicates. When absent, the result is the one-element window holding
/// the nearest lower element, or an empty range if all elements are greater.
/// `range` limits the search to a sub-window of `haystack`.
pub fn search_range<T: PartialOrd + Copy>(
    haystack: &[T],
    needle: T,
    range: Option<Range<usize>>,
) -> Range<usize> {
    let window = clamp_window(haystack.len(), range);
    search_range_impl(haystack, needle, window.start, window.end)
}

fn search_range_impl<T: PartialOrd + Copy>(
    haystack: &[T],
    needle: T,
    i: usize,
    j: usize,
) -> Range<usize> {
    if i == j {
        return i..j;
    }
    if i + 1 == j {
        return if haystack[i] <= needle { i..j } else { i..i };
    }
    let mid = i + (j - i) / 2;
    if needle < haystack[mid] {
        search_range_impl(haystack, needle, i, mid)
    } else if needle > haystack[mid] {
        search_range_impl(haystack, needle, mid, j)
    } else {
        // Exact hit: the duplicate run is contiguous, walk out to its edges
        // without leaving the window.
        let mut left = mid;
        while left > i && haystack[left - 1] == needle {
            left -= 1;
        }
        let mut right = mid + 1;
        while right < j && haystack[right] == needle {
            right += 1;
        }
        left..right
    }
}

/// Like [`search_range`], but collapses to the empty range `j..j` when
/// `needle` does not occur.
pub fn search_eq<T: PartialOrd + Copy>(
    haystack: &[T],
    needle: T,
    range: Option<Range<usize>>,
) -> Range<usize> {
    let found = search_range(haystack, needle, range);
    match haystack.get(found.start) {
        Some(&first) if !found.is_empty() && first == needle => found,
        _ => found.end..found.end,
    }
}

/// Indices of the nearest element `<= needle` and the nearest element
/// `> needle`; `None` marks a missing side.
///
/// This brackets a pointer position between the two samples around it.
pub fn search_segment<T: PartialOrd + Copy>(
    haystack: &[T],
    needle: T,
) -> (Option<usize>, Option<usize>) {
    if haystack.is_empty() {
        return (None, None);
    }
    match search(haystack, needle) {
        None => (None, Some(0)),
        Some(left) if left + 1 == haystack.len() => (Some(left), None),
        Some(left) => (Some(left), Some(left + 1)),
    }
}

fn clamp_window(len: usize, range: Option<Range<usize>>) -> Range<usize> {
    match range {
        Some(r) => {
            let end = r.end.min(len);
            r.start.min(end)..end
        }
        None => 0..len,
    }
}
