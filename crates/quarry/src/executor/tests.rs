use crate::{
    db::Db,
    obs::{ExecKind, MetricsEvent, MetricsSink},
    prelude::*,
    query::predicate::{self, CompareOp},
    test_fixtures::{Member, Team, empty_db, seeded_db},
};
use std::sync::Mutex;

fn member_ids(members: &[Member]) -> Vec<u64> {
    members.iter().map(|m| m.id).collect()
}

/// Seeded db plus a fifth member that belongs to no team.
fn db_with_teamless_member() -> Db {
    let db = seeded_db();
    db.session()
        .insert(Member {
            id: 5,
            name: Some("member5".to_string()),
            age: 50,
            team: BelongsTo::none(),
        })
        .unwrap();

    db
}

//
// Entity terminals
//

#[test]
fn fetch_returns_all_rows_in_key_order() {
    let db = seeded_db();
    let members = db.session().load::<Member>().fetch().unwrap();

    assert_eq!(member_ids(&members), vec![1, 2, 3, 4]);
}

#[test]
fn filter_narrows_results() {
    let db = seeded_db();
    let session = db.session();

    let members = session
        .load::<Member>()
        .filter(gte("age", 20))
        .filter(lt("age", 40))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![2, 3]);

    let members = session
        .load::<Member>()
        .filter(eq("age", 10) | eq("age", 40))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![1, 4]);

    let members = session
        .load::<Member>()
        .filter(in_("age", [20, 30, 99]))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![2, 3]);
}

#[test]
fn comparisons_involving_null_never_match() {
    let db = seeded_db();
    let session = db.session();

    // member3 has no name; ne still excludes it.
    let members = session
        .load::<Member>()
        .filter(ne("name", "member1"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![2, 4]);

    let members = session
        .load::<Member>()
        .filter(is_null("name"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![3]);

    let members = session
        .load::<Member>()
        .filter(is_not_null("name"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![1, 2, 4]);
}

#[test]
fn fetch_one_enforces_cardinality() {
    let db = seeded_db();
    let session = db.session();

    let found = session
        .load::<Member>()
        .filter(eq("age", 30))
        .fetch_one()
        .unwrap();
    assert_eq!(found.map(|m| m.id), Some(3));

    let missing = session
        .load::<Member>()
        .filter(eq("age", 99))
        .fetch_one()
        .unwrap();
    assert!(missing.is_none());

    let err = session.load::<Member>().fetch_one().unwrap_err();
    assert!(err.is_ambiguous());
}

#[test]
fn fetch_first_takes_the_head_of_the_effective_order() {
    let db = seeded_db();

    let oldest = db
        .session()
        .load::<Member>()
        .order_by([desc("age")])
        .fetch_first()
        .unwrap()
        .unwrap();
    assert_eq!(oldest.id, 4);
}

#[test]
fn order_by_directions_and_tiebreaks() {
    let db = seeded_db();
    let session = db.session();

    let members = session
        .load::<Member>()
        .order_by([desc("age")])
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![4, 3, 2, 1]);

    // Later expressions break ties of earlier ones.
    let members = session
        .load::<Member>()
        .order_by([desc("team"), asc("age")])
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![3, 4, 1, 2]);
}

#[test]
fn null_sort_keys_are_placed_explicitly() {
    let db = db_with_teamless_member();
    let session = db.session();

    // Default placement: nulls first.
    let members = session
        .load::<Member>()
        .order_by([asc("team")])
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members)[0], 5);

    let members = session
        .load::<Member>()
        .order_by([asc("team").nulls_last()])
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members)[4], 5);

    // Placement is independent of direction.
    let members = session
        .load::<Member>()
        .order_by([desc("team").nulls_last()])
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![3, 4, 1, 2, 5]);
}

#[test]
fn offset_and_limit_window_the_ordered_results() {
    let db = seeded_db();
    let session = db.session();

    let members = session
        .load::<Member>()
        .order_by([asc("age")])
        .offset(1)
        .limit(2)
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![2, 3]);

    // Offset past the end is empty, not an error.
    let members = session
        .load::<Member>()
        .offset(10)
        .fetch()
        .unwrap();
    assert!(members.is_empty());
}

#[test]
fn fetch_count_ignores_the_window() {
    let db = seeded_db();

    let session = db.session();
    let query = session.load::<Member>().filter(gte("age", 20)).limit(1);

    assert_eq!(query.fetch_count().unwrap(), 3);
    assert_eq!(query.fetch().unwrap().len(), 1);
}

#[test]
fn fetch_page_reports_total_and_window() {
    let db = seeded_db();

    let page = db
        .session()
        .load::<Member>()
        .order_by([asc("age")])
        .offset(1)
        .limit(2)
        .fetch_page()
        .unwrap();

    assert_eq!(page.total(), 4);
    assert_eq!(page.offset(), 1);
    assert_eq!(page.limit(), Some(2));
    assert_eq!(member_ids(page.results()), vec![2, 3]);
}

//
// Joins
//

#[test]
fn relation_join_filters_through_the_target() {
    let db = seeded_db();

    let members = db
        .session()
        .load::<Member>()
        .join("team")
        .filter(eq("team.name", "teamA"))
        .fetch()
        .unwrap();

    assert_eq!(member_ids(&members), vec![1, 2]);
}

#[test]
fn inner_join_drops_unmatched_rows_left_join_keeps_them() {
    let db = db_with_teamless_member();
    let session = db.session();

    let members = session.load::<Member>().join("team").fetch().unwrap();
    assert_eq!(member_ids(&members), vec![1, 2, 3, 4]);

    let members = session.load::<Member>().left_join("team").fetch().unwrap();
    assert_eq!(member_ids(&members), vec![1, 2, 3, 4, 5]);

    // On a left-join miss the joined side reads as null, a non-match.
    let members = session
        .load::<Member>()
        .left_join("team")
        .filter(eq("team.name", "teamB"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![3, 4]);
}

#[test]
fn has_many_join_multiplies_then_dedupes_sources() {
    let db = seeded_db();
    let session = db.session();

    // Both teams have two members each; every team still appears once.
    let teams = session.load::<Team>().join("members").fetch().unwrap();
    assert_eq!(teams.len(), 2);

    let teams = session
        .load::<Team>()
        .join("members")
        .filter(gt("member.age", 25))
        .fetch()
        .unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].name, "teamB");
}

#[test]
fn join_on_narrows_the_natural_match() {
    let db = seeded_db();

    let teams = db
        .session()
        .load::<Team>()
        .join("members")
        .on(gte("member.age", 40))
        .fetch()
        .unwrap();

    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].name, "teamB");
}

#[test]
fn left_join_on_keeps_rows_that_fail_the_join_predicate() {
    let db = seeded_db();
    let session = db.session();

    // teamB members fail the on-predicate; they survive with a null slot.
    let members = session
        .load::<Member>()
        .left_join("team")
        .on(eq("team.name", "teamA"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![1, 2, 3, 4]);

    // The null slot is a non-match for any later comparison.
    let members = session
        .load::<Member>()
        .left_join("team")
        .on(eq("team.name", "teamA"))
        .filter(eq("team.name", "teamA"))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![1, 2]);
}

#[test]
fn entity_join_uses_on_as_sole_constraint() {
    let db = seeded_db();

    let members = db
        .session()
        .load::<Member>()
        .inner_join::<Team>()
        .on(predicate::eq_field("team", "team.id"))
        .filter(eq("team.name", "teamB"))
        .fetch()
        .unwrap();

    assert_eq!(member_ids(&members), vec![3, 4]);
}

#[test]
fn fetch_join_hydrates_relations() {
    let db = seeded_db();
    let session = db.session();

    let members = session
        .load::<Member>()
        .join("team")
        .fetch_join()
        .fetch()
        .unwrap();
    assert!(members.iter().all(|m| m.team.is_loaded()));
    assert_eq!(
        members[0].team.get().map(|t| t.name.as_str()),
        Some("teamA")
    );

    // Without fetch_join the handle stays lazy.
    let members = session.load::<Member>().join("team").fetch().unwrap();
    assert!(members.iter().all(|m| !m.team.is_loaded()));

    let teams = session
        .load::<Team>()
        .join("members")
        .fetch_join()
        .fetch()
        .unwrap();
    assert_eq!(teams[0].members.get().map(<[Member]>::len), Some(2));
}

//
// Tuple terminals
//

#[test]
fn group_by_aggregates_per_group_in_canonical_key_order() {
    let db = seeded_db();

    let tuples = db
        .session()
        .load::<Member>()
        .select([col("team"), count(), sum("age"), avg("age"), max("age")])
        .group_by(["team"])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples.len(), 2);
    assert_eq!(tuples[0].get("team"), Some(&Value::Int(1)));
    assert_eq!(tuples[0].get("count"), Some(&Value::Int(2)));
    assert_eq!(tuples[0].get("sum(age)"), Some(&Value::Int(30)));
    assert_eq!(tuples[0].get("avg(age)"), Some(&Value::from(15.0)));
    assert_eq!(tuples[1].get("team"), Some(&Value::Int(2)));
    assert_eq!(tuples[1].get("sum(age)"), Some(&Value::Int(70)));
    assert_eq!(tuples[1].get("avg(age)"), Some(&Value::from(35.0)));
    assert_eq!(tuples[1].get("max(age)"), Some(&Value::Int(40)));
}

#[test]
fn group_by_a_joined_alias_column() {
    let db = seeded_db();

    let tuples = db
        .session()
        .load::<Member>()
        .join("team")
        .select([col("team.name"), avg("age")])
        .group_by(["team.name"])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples.len(), 2);
    assert_eq!(tuples[0].get("team.name"), Some(&Value::from("teamA")));
    assert_eq!(tuples[0].get("avg(age)"), Some(&Value::from(15.0)));
    assert_eq!(tuples[1].get("team.name"), Some(&Value::from("teamB")));
    assert_eq!(tuples[1].get("avg(age)"), Some(&Value::from(35.0)));
}

#[test]
fn global_aggregate_without_group_by_yields_one_tuple() {
    let db = seeded_db();

    let tuples = db
        .session()
        .load::<Member>()
        .select([count(), sum("age"), avg("age"), max("age"), min("age")])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].get("count"), Some(&Value::Int(4)));
    assert_eq!(tuples[0].get("sum(age)"), Some(&Value::Int(100)));
    assert_eq!(tuples[0].get("avg(age)"), Some(&Value::from(25.0)));
    assert_eq!(tuples[0].get("max(age)"), Some(&Value::Int(40)));
    assert_eq!(tuples[0].get("min(age)"), Some(&Value::Int(10)));
}

#[test]
fn aggregates_over_no_rows_are_null_count_is_zero() {
    let db = empty_db();

    let tuples = db
        .session()
        .load::<Member>()
        .select([count(), sum("age"), max("age")])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].get("count"), Some(&Value::Int(0)));
    assert_eq!(tuples[0].get("sum(age)"), Some(&Value::Null));
    assert_eq!(tuples[0].get("max(age)"), Some(&Value::Null));
}

#[test]
fn aggregates_skip_null_inputs_count_does_not() {
    let db = seeded_db();

    // member3 has no name; extrema fold over the three present names.
    let tuples = db
        .session()
        .load::<Member>()
        .select([count(), min("name"), max("name")])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples[0].get("count"), Some(&Value::Int(4)));
    assert_eq!(tuples[0].get("min(name)"), Some(&Value::from("member1")));
    assert_eq!(tuples[0].get("max(name)"), Some(&Value::from("member4")));
}

#[test]
fn null_group_keys_sort_before_all_values() {
    let db = db_with_teamless_member();

    let tuples = db
        .session()
        .load::<Member>()
        .select([col("team"), count()])
        .group_by(["team"])
        .fetch_tuples()
        .unwrap();

    assert_eq!(tuples.len(), 3);
    assert_eq!(tuples[0].get("team"), Some(&Value::Null));
    assert_eq!(tuples[0].get("count"), Some(&Value::Int(1)));
}

#[test]
fn terminal_and_projection_modes_must_agree() {
    let db = seeded_db();
    let session = db.session();

    let err = session
        .load::<Member>()
        .select([count()])
        .fetch()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Construct(ConstructError::EntityTerminalOnTupleQuery)
    ));

    let err = session.load::<Member>().fetch_tuples().unwrap_err();
    assert!(matches!(
        err,
        Error::Construct(ConstructError::TupleTerminalWithoutProjection)
    ));
}

//
// Subqueries
//

#[test]
fn uncorrelated_subquery_compares_against_one_scalar() {
    let db = seeded_db();
    let session = db.session();

    let members = session
        .load::<Member>()
        .filter(gte_sub("age", scalar::<Member>().avg("age")))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![3, 4]);

    let members = session
        .load::<Member>()
        .filter(eq_sub("age", scalar::<Member>().max("age")))
        .fetch()
        .unwrap();
    assert_eq!(member_ids(&members), vec![4]);
}

#[test]
fn correlated_subquery_recomputes_per_outer_row() {
    let db = seeded_db();

    // Oldest member of each team.
    let members = db
        .session()
        .load::<Member>()
        .filter(eq_sub(
            "age",
            scalar::<Member>()
                .filter(Predicate::compare("team", CompareOp::Eq, outer("team")))
                .max("age"),
        ))
        .fetch()
        .unwrap();

    assert_eq!(member_ids(&members), vec![2, 4]);
}

#[test]
fn filtered_subquery_over_another_entity() {
    let db = seeded_db();

    let members = db
        .session()
        .load::<Member>()
        .filter(eq_sub(
            "team",
            scalar::<Team>().filter(eq("name", "teamB")).max("id"),
        ))
        .fetch()
        .unwrap();

    assert_eq!(member_ids(&members), vec![3, 4]);
}

//
// Metrics
//

struct RecordingSink(Mutex<Vec<MetricsEvent>>);

impl MetricsSink for RecordingSink {
    fn record(&self, event: MetricsEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn recording_sink() -> &'static RecordingSink {
    Box::leak(Box::new(RecordingSink(Mutex::new(Vec::new()))))
}

#[test]
fn fetch_page_runs_two_executions() {
    let db = seeded_db();
    let sink = recording_sink();

    db.session()
        .metrics_sink(sink)
        .load::<Member>()
        .limit(2)
        .fetch_page()
        .unwrap();

    let events = sink.0.lock().unwrap();
    let starts = events
        .iter()
        .filter(|event| matches!(event, MetricsEvent::ExecStart { kind: ExecKind::Load, .. }))
        .count();
    assert_eq!(starts, 2);
}

#[test]
fn uncorrelated_subquery_scans_its_target_once() {
    let db = seeded_db();
    let sink = recording_sink();

    db.session()
        .metrics_sink(sink)
        .load::<Member>()
        .filter(gte_sub("age", scalar::<Member>().avg("age")))
        .fetch()
        .unwrap();

    let events = sink.0.lock().unwrap();
    let member_scans = events
        .iter()
        .filter(|event| matches!(event, MetricsEvent::RowsScanned { entity: "member", .. }))
        .count();
    // One source scan, one cached subquery scan; never one per row.
    assert_eq!(member_scans, 2);
}

#[test]
fn execution_reports_result_counts() {
    let db = seeded_db();
    let sink = recording_sink();

    db.session()
        .metrics_sink(sink)
        .load::<Member>()
        .filter(gte("age", 30))
        .fetch()
        .unwrap();

    let events = sink.0.lock().unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        MetricsEvent::ExecFinish {
            kind: ExecKind::Load,
            entity: "member",
            rows: 2,
        }
    )));
}

//
// Laws
//

mod laws {
    use super::*;
    use proptest::prelude::*;

    fn db_with_ages(ages: &[i64]) -> Db {
        let db = empty_db();
        let session = db.session();
        session.insert(Team::new(1, "teamA")).unwrap();
        for (i, &age) in ages.iter().enumerate() {
            session
                .insert(Member::new(i as u64 + 1, Some("m"), age, 1))
                .unwrap();
        }

        db
    }

    proptest! {
        #[test]
        fn count_agrees_with_fetch_length(ages in proptest::collection::vec(0_i64..100, 0..12)) {
            let db = db_with_ages(&ages);
            let session = db.session();
            let query = session.load::<Member>().filter(gte("age", 50));

            prop_assert_eq!(
                query.fetch_count().unwrap(),
                query.fetch().unwrap().len() as u64
            );
        }

        #[test]
        fn ascending_order_is_sorted_and_stable(ages in proptest::collection::vec(0_i64..10, 0..12)) {
            let db = db_with_ages(&ages);
            let members = db
                .session()
                .load::<Member>()
                .order_by([asc("age")])
                .fetch()
                .unwrap();

            for pair in members.windows(2) {
                prop_assert!(pair[0].age <= pair[1].age);
                // Ties keep key order.
                if pair[0].age == pair[1].age {
                    prop_assert!(pair[0].id < pair[1].id);
                }
            }
        }

        #[test]
        fn window_is_a_slice_of_the_full_order(
            ages in proptest::collection::vec(0_i64..100, 0..12),
            offset in 0_u64..16,
            limit in 0_u64..16,
        ) {
            let db = db_with_ages(&ages);
            let session = db.session();

            let full = session
                .load::<Member>()
                .order_by([asc("age")])
                .fetch()
                .unwrap();
            let windowed = session
                .load::<Member>()
                .order_by([asc("age")])
                .offset(offset)
                .limit(limit)
                .fetch()
                .unwrap();

            let start = usize::min(offset as usize, full.len());
            let end = usize::min(start + limit as usize, full.len());
            prop_assert_eq!(member_ids(&windowed), member_ids(&full[start..end]));
        }
    }
}
