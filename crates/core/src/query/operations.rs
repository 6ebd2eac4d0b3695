use std::cmp::Ordering;

use serde_json::Value;

use super::{ListQuery, ListResult, Pagination, Sort, SortDirection};
use crate::predicate::compare_values;
use crate::record::Record;

/// Sorts records by the given keys, falling back to id order.
pub fn sort_records(records: &mut [Record], sort: &[Sort]) {
    records.sort_by(|a, b| {
        for key in sort {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id_str().cmp(b.id_str())
    });
}

/// Returns the requested page of already sorted records.
pub fn paginate(records: Vec<Record>, pagination: Option<Pagination>) -> Vec<Record> {
    match pagination {
        Some(p) => records.into_iter().skip(p.offset()).take(p.limit()).collect(),
        None => records,
    }
}

/// Filters, sorts and pages a set of records.
pub fn select<'a>(records: impl IntoIterator<Item = &'a Record>, query: &ListQuery) -> ListResult {
    let mut matched: Vec<Record> = records
        .into_iter()
        .filter(|r| query.predicate.matches(r))
        .cloned()
        .collect();
    let total = matched.len() as u64;

    sort_records(&mut matched, &query.sort);
    ListResult {
        items: paginate(matched, query.pagination),
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CompareOp, Predicate};
    use crate::record::{DataClause, EntityId};

    fn rec(id: &str, amount: i64, active: bool) -> Record {
        let mut r = Record::new(EntityId::new(id), DataClause::new().with("amount", amount));
        r.set_active(active);
        r
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id_str()).collect()
    }

    fn fixture() -> Vec<Record> {
        vec![
            rec("c", 30, true),
            rec("a", 10, true),
            rec("d", 40, false),
            rec("b", 20, true),
        ]
    }

    #[test]
    fn test_default_sort_is_by_id() {
        let mut records = fixture();
        sort_records(&mut records, &[]);
        assert_eq!(ids(&records), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_sort_desc() {
        let mut records = fixture();
        sort_records(&mut records, &[Sort::desc("amount")]);
        assert_eq!(ids(&records), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_select_filters_counts_and_pages() {
        let records = fixture();
        let query = ListQuery::new(
            Predicate::eq("isActive", true)
                & Predicate::compare("amount", CompareOp::Gte, 20),
        )
        .with_pagination(Some(Pagination::new(1, 1)));

        let result = select(&records, &query);
        assert_eq!(result.total, 2);
        assert_eq!(ids(&result.items), vec!["b"]);

        let second = select(&records, &query.clone().with_pagination(Some(Pagination::new(2, 1))));
        assert_eq!(ids(&second.items), vec!["c"]);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let records = fixture();
        let query =
            ListQuery::new(Predicate::True).with_pagination(Some(Pagination::new(10, 10)));
        let result = select(&records, &query);
        assert!(result.items.is_empty());
        assert_eq!(result.total, 4);
    }
}
