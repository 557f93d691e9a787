use serde::Serialize;

/// One page of a listing, ordered newest first unless the caller says
/// otherwise.
#[derive(Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Slice `items` into the requested page. Pages are 1-based; a page past the
/// end yields empty items rather than an error, and page 1 never reports a
/// previous page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = items.len();

    // Page numbers come straight off the query string; an offset that does
    // not fit in usize is past the end, not a panic
    let start = match (page - 1).checked_mul(per_page) {
        Some(start) => start,
        None => {
            return Page {
                items: Vec::new(),
                has_next: false,
                has_prev: page > 1,
            }
        }
    };

    let page_items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Page {
        has_next: start + page_items.len() < total,
        has_prev: page > 1,
        items: page_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_prev() {
        let page = paginate(vec![1, 2, 3, 4, 5], 1, 2);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn middle_page_has_both() {
        let page = paginate(vec![1, 2, 3, 4, 5], 2, 2);
        assert_eq!(page.items, vec![3, 4]);
        assert!(page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = paginate(vec![1, 2, 3, 4, 5], 3, 2);
        assert_eq!(page.items, vec![5]);
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let page = paginate(vec![1, 2, 3], 9, 2);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn empty_listing() {
        let page = paginate(Vec::<i32>::new(), 1, 10);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn huge_page_number_is_empty_not_a_panic() {
        let page = paginate(vec![1, 2, 3], usize::MAX, 2);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn page_zero_is_clamped_to_one() {
        let page = paginate(vec![1, 2, 3], 0, 2);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_prev);
    }
}
