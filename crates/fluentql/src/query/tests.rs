use super::*;
use crate::bindings::BindingCategory;
use crate::error::{QueryError, QueryResult};
use crate::pagination::Cursor;
use crate::row::Row;
use crate::testing::{self, FakeConnection};
use crate::value::{Column, Expression, Value};
use futures_util::StreamExt;
use std::sync::Arc;

fn users() -> Builder {
    testing::table(FakeConnection::postgres(), "users").1
}

fn users_on(connection: FakeConnection) -> (Arc<FakeConnection>, Builder) {
    testing::table(connection, "users")
}

fn id_row(id: i64) -> Row {
    Row::from_pairs([("id", Value::Int(id))])
}

// ===== compilation =====

#[test]
fn test_where_or_where() {
    let mut q = users();
    q.where_("votes", ">", 100).unwrap().or_where_eq("name", "John");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "votes" > ? or "name" = ?"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Int(100), Value::from("John")]);
}

#[test]
fn test_where_in() {
    let mut q = users();
    q.where_in("id", [1, 2, 3]).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "id" in (?, ?, ?)"#);
    assert_eq!(
        q.get_bindings(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_empty_where_in_is_never_true() {
    let mut q = users();
    q.where_in("id", Vec::<i64>::new()).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where 0 = 1"#);
    assert!(q.get_bindings().is_empty());

    let mut q = users();
    q.where_not_in("id", Vec::<i64>::new()).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where 1 = 1"#);
}

#[test]
fn test_where_in_rejects_nested_arrays() {
    let mut q = users();
    let err = q
        .where_in("id", [Value::Array(vec![Value::Int(1)])])
        .unwrap_err();
    assert!(matches!(err, QueryError::NestedArrayNotAllowed));
}

#[test]
fn test_aggregate_drops_orders_and_order_bindings() {
    let mut q = users();
    q.order_by_raw("field(status, ?)", [Value::from("active")])
        .order_by("name", "asc")
        .unwrap();
    q.set_aggregate("count", vec![Column::from("*")]);

    assert!(q.orders.is_empty());
    assert!(q.get_raw_bindings().get(BindingCategory::Order).is_empty());
    assert_eq!(q.to_sql().unwrap(), r#"select count(*) as aggregate from "users""#);
}

#[test]
fn test_grouped_aggregate_keeps_orders() {
    let mut q = users();
    q.group_by(["status"]).order_by("status", "asc").unwrap();
    q.set_aggregate("count", vec![Column::from("*")]);
    assert_eq!(q.orders.len(), 1);
}

#[test]
fn test_two_arg_where_matches_explicit_equals() {
    let mut sugar = users();
    sugar.where_eq("name", "John");
    let mut explicit = users();
    explicit.where_("name", "=", "John").unwrap();
    assert_eq!(sugar, explicit);
}

#[test]
fn test_unknown_operator_is_taken_as_the_value() {
    let mut q = users();
    q.where_("name", "John", Value::Null).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "name" = ?"#);
    assert_eq!(q.get_bindings(), vec![Value::from("John")]);
}

#[test]
fn test_null_comparisons_compile_to_is_null() {
    let mut q = users();
    q.where_eq("deleted_at", Value::Null)
        .where_("banned_at", "!=", Value::Null)
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "deleted_at" is null and "banned_at" is not null"#
    );
    assert!(q.get_bindings().is_empty());
}

#[test]
fn test_null_with_ordering_operator_is_rejected() {
    let mut q = users();
    let err = q.where_("votes", ">", Value::Null).unwrap_err();
    assert!(matches!(
        err,
        QueryError::IllegalOperatorValueCombination { operator } if operator == ">"
    ));
}

#[test]
fn test_empty_nested_group_adds_nothing() {
    let mut q = users();
    q.where_nested(|_| Ok(())).unwrap();
    assert!(q.wheres.is_empty());
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users""#);
}

#[test]
fn test_nested_group_is_parenthesised() {
    let mut q = users();
    q.where_eq("a", 1)
        .or_where_nested(|q| {
            q.where_eq("b", 2).where_("c", "<", 3)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "a" = ? or ("b" = ? and "c" < ?)"#
    );
    assert_eq!(
        q.get_bindings(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_nested_closure_errors_propagate() {
    let mut q = users();
    let err = q
        .where_nested(|q| {
            q.where_("votes", "<", Value::Null)?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, QueryError::IllegalOperatorValueCombination { .. }));
}

#[test]
fn test_where_not_negates_the_group() {
    let mut q = users();
    q.where_not(|q| {
        q.where_eq("status", "banned");
        Ok(())
    })
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where not ("status" = ?)"#
    );
}

#[test]
fn test_array_value_binds_its_first_element() {
    let mut q = users();
    q.where_eq("id", Value::Array(vec![Value::Array(vec![Value::Int(4), Value::Int(5)])]));
    assert_eq!(q.get_bindings(), vec![Value::Int(4)]);
}

#[test]
fn test_bindings_follow_clause_order_not_call_order() {
    let mut q = users();
    q.order_by_raw("position(status in ?)", [Value::from("active")])
        .having_raw("count(*) > ?", [Value::Int(2)])
        .where_("votes", ">", 10)
        .unwrap()
        .group_by(["status"])
        .join_where("posts", "posts.user_id", "=", 7)
        .unwrap()
        .select_raw("coalesce(nickname, ?) as display", [Value::from("anon")]);

    let sql = q.to_sql().unwrap();
    assert_eq!(
        sql,
        r#"select coalesce(nickname, ?) as display from "users" inner join "posts" on "posts"."user_id" = ? where "votes" > ? group by "status" having count(*) > ? order by position(status in ?)"#
    );
    let bindings = q.get_bindings();
    assert_eq!(
        bindings,
        vec![
            Value::from("anon"),
            Value::Int(7),
            Value::Int(10),
            Value::Int(2),
            Value::from("active"),
        ]
    );
    assert_eq!(sql.matches('?').count(), bindings.len());
}

#[test]
fn test_merged_bindings_are_recast() {
    let backed = Value::Enum(Box::new(Value::from("admin")));
    let mut q = users();
    q.set_bindings(vec![backed.clone()], "where").unwrap();
    assert_eq!(q.get_raw_bindings().get(BindingCategory::Where), [backed]);

    q.add_bindings([Value::Int(1)], "where").unwrap();
    assert_eq!(
        q.get_raw_bindings().get(BindingCategory::Where),
        [Value::from("admin"), Value::Int(1)]
    );
}

#[test]
fn test_unknown_binding_category_is_rejected() {
    let mut q = users();
    let err = q.add_binding(1, "nope").unwrap_err();
    assert!(matches!(err, QueryError::InvalidBindingCategory(name) if name == "nope"));
}

#[test]
fn test_joins() {
    let mut q = users();
    q.join("contacts", "users.id", "=", "contacts.user_id")
        .left_join("orders", "users.id", "=", "orders.user_id")
        .cross_join("regions");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" inner join "contacts" on "users"."id" = "contacts"."user_id" left join "orders" on "users"."id" = "orders"."user_id" cross join "regions""#
    );
}

#[test]
fn test_join_with_closure_mixes_columns_and_values() {
    let mut q = users();
    q.join_with("contacts", JoinType::Left, |join| {
        join.on("users.id", "=", "contacts.user_id");
        join.where_("contacts.kind", "=", "email")?;
        Ok(())
    })
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" left join "contacts" on "users"."id" = "contacts"."user_id" and "contacts"."kind" = ?"#
    );
    assert_eq!(q.get_bindings(), vec![Value::from("email")]);
}

#[test]
fn test_where_sub_and_exists() {
    let mut q = users();
    q.where_in_sub("id", |q: &mut Builder| -> QueryResult<()> {
        q.from("bans").select(["user_id"]).where_eq("active", true);
        Ok(())
    })
    .unwrap()
    .where_exists(|q: &mut Builder| -> QueryResult<()> {
        q.from("posts").where_column("posts.user_id", "=", "users.id");
        Ok(())
    })
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "id" in (select "user_id" from "bans" where "active" = ?) and exists (select * from "posts" where "posts"."user_id" = "users"."id")"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Bool(true)]);
}

#[test]
fn test_where_column_sub_rejects_null_without_leaving_bindings() {
    let mut q = users();
    let err = q
        .where_column_sub(
            |q: &mut Builder| -> QueryResult<()> {
                q.from("profiles").select(["votes"]).where_eq("active", true);
                Ok(())
            },
            ">",
            Value::Null,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::IllegalOperatorValueCombination { operator } if operator == ">"
    ));
    assert!(q.wheres.is_empty());
    assert!(q.get_bindings().is_empty());
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users""#);
}

#[test]
fn test_json_selectors() {
    let mut q = users();
    q.where_eq("options->language", "en")
        .where_eq("options->enabled", true);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "options"->>'language' = ? and ("options"->'enabled')::jsonb = 'true'::jsonb"#
    );
    assert_eq!(q.get_bindings(), vec![Value::from("en")]);
}

#[test]
fn test_like_and_date_parts() {
    let mut q = users();
    q.where_like("name", "%tay%", false)
        .where_day("created_at", "=", 5)
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "name"::text ilike ? and extract(day from "created_at") = ?"#
    );
    assert_eq!(q.get_bindings(), vec![Value::from("%tay%"), Value::from("05")]);
}

#[test]
fn test_where_between() {
    let mut q = users();
    q.where_between("votes", [1, 100]);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "votes" between ? and ?"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Int(1), Value::Int(100)]);
}

#[test]
fn test_having_nested() {
    let mut q = users();
    q.group_by(["status"])
        .having("votes", ">", 1)
        .unwrap()
        .or_having_nested(|q| {
            q.having_eq("status", "vip").having_null("flag");
            Ok(())
        })
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" group by "status" having "votes" > ? or ("status" = ? and "flag" is null)"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Int(1), Value::from("vip")]);
}

#[test]
fn test_ordering_and_limits() {
    let mut q = users();
    q.latest(None).order_by("name", "ASC").unwrap().for_page(3, 15);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" order by "created_at" desc, "name" asc limit 15 offset 30"#
    );

    let err = users().order_by("name", "sideways").unwrap_err();
    assert!(matches!(err, QueryError::InvalidOrderDirection(_)));
}

#[test]
fn test_reorder_clears_order_bindings() {
    let mut q = users();
    q.order_by_raw("field(id, ?)", [Value::Int(3)])
        .reorder_by("id", "desc")
        .unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" order by "id" desc"#);
    assert!(q.get_bindings().is_empty());
}

#[test]
fn test_union_routes_order_and_limit_to_the_union() {
    let mut q = users();
    q.where_eq("a", 1)
        .union_all(|u: &mut Builder| -> QueryResult<()> {
            u.from("admins").where_eq("b", 2);
            Ok(())
        })
        .unwrap()
        .order_by("a", "asc")
        .unwrap()
        .limit(10);
    assert!(q.orders.is_empty());
    assert_eq!(
        q.to_sql().unwrap(),
        r#"(select * from "users" where "a" = ?) union all (select * from "admins" where "b" = ?) order by "a" asc limit 10"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_for_page_after_id_on_a_union_orders_the_union() {
    let mut q = users();
    q.union_all(|u: &mut Builder| -> QueryResult<()> {
        u.from("admins");
        Ok(())
    })
    .unwrap()
    .order_by("id", "desc")
    .unwrap()
    .for_page_after_id(10, Some(Value::Int(5)), "id");
    assert!(q.orders.is_empty());
    assert_eq!(q.union_orders.len(), 1);
    assert_eq!(q.union_limit, Some(10));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"(select * from "users" where "id" > ?) union all (select * from "admins") order by "id" asc limit 10"#
    );
    assert_eq!(q.get_bindings(), vec![Value::Int(5)]);
}

#[test]
fn test_group_limit_wraps_in_a_window() {
    let mut q = users();
    q.group_limit(2, "team_id").order_by_desc("score");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from (select *, row_number() over (partition by "team_id" order by "score" desc) as "group_row" from "users") as "limited_table" where "group_row" <= 2 order by "group_row""#
    );
}

#[test]
fn test_lock_uses_the_write_connection() {
    let mut q = users();
    q.where_eq("id", 1).lock_for_update();
    assert!(q.use_write_connection);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "id" = ? for update"#
    );
}

#[test]
fn test_distinct_on_and_select_sub() {
    let mut q = users();
    q.distinct_on(["team_id"])
        .select(["team_id", "name"])
        .add_select_sub(
            |q: &mut Builder| -> QueryResult<()> {
                q.from("posts").select_raw("count(*)", Vec::<Value>::new());
                Ok(())
            },
            "posts",
        )
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select distinct on ("team_id") "team_id", "name", (select count(*) from "posts") as "posts" from "users""#
    );
}

#[test]
fn test_from_sub_carries_bindings() {
    let mut q = users().new_query();
    q.from_sub(
        |q: &mut Builder| -> QueryResult<()> {
            q.from("users").where_eq("active", true);
            Ok(())
        },
        "active_users",
    )
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from (select * from "users" where "active" = ?) as "active_users""#
    );
    assert_eq!(q.get_bindings(), vec![Value::Bool(true)]);
}

#[test]
fn test_missing_from_is_an_error() {
    let mut q = testing::pg();
    assert!(matches!(q.to_sql(), Err(QueryError::MissingFrom)));
}

#[test]
fn test_to_raw_sql_inlines_bindings() {
    let mut q = users();
    q.where_eq("name", "O'Brien").where_("votes", ">", 3).unwrap();
    assert_eq!(
        q.to_raw_sql().unwrap(),
        r#"select * from "users" where "name" = 'O''Brien' and "votes" > 3"#
    );
}

#[test]
fn test_conditionals() {
    let mut q = users();
    q.when(true, |q| {
        q.where_eq("a", 1);
        Ok(())
    })
    .unwrap()
    .unless(true, |q| {
        q.where_eq("b", 2);
        Ok(())
    })
    .unwrap()
    .when_else(
        false,
        |q| {
            q.where_eq("c", 3);
            Ok(())
        },
        |q| {
            q.where_eq("d", 4);
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "a" = ? and "d" = ?"#
    );
}

#[test]
fn test_before_query_runs_once_on_compile() {
    let mut q = users();
    q.before_query(|q| {
        q.where_eq("tenant_id", 9);
    });
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "tenant_id" = ?"#
    );
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "tenant_id" = ?"#
    );
}

#[test]
fn test_dynamic_where() {
    let mut q = users();
    q.dynamic_where("whereNameOrEmail", vec![Value::from("a"), Value::from("b")])
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "name" = ? or "email" = ?"#
    );

    let err = users().dynamic_where("whereName", Vec::new()).unwrap_err();
    assert!(matches!(err, QueryError::InvalidDynamicWhere(_)));
}

#[test]
fn test_clone_without_keeps_the_original() {
    let mut q = users();
    q.where_eq("a", 1).order_by_desc("id").limit(5);
    let mut stripped = q.clone_without(&[Component::Orders, Component::Limit]);
    assert_eq!(stripped.to_sql().unwrap(), r#"select * from "users" where "a" = ?"#);
    assert_eq!(q.limit, Some(5));
}

// ===== terminals =====

#[tokio::test]
async fn test_count_runs_an_aggregate() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("AGGREGATE", 3)])]);
    q.where_("votes", ">", 1).unwrap().order_by_desc("id");

    assert_eq!(q.count().await.unwrap(), 3);
    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"select count(*) as aggregate from "users" where "votes" > ?"#
    );
    assert_eq!(last.bindings, vec![Value::Int(1)]);
}

#[tokio::test]
async fn test_sum_defaults_to_zero() {
    let (_fake, mut q) = users_on(FakeConnection::postgres());
    assert_eq!(q.sum("votes").await.unwrap(), Value::Int(0));
    assert!(matches!(
        users().aggregate("max", Vec::<Column>::new()).await,
        Err(QueryError::InvalidAggregateColumns(_))
    ));
}

#[tokio::test]
async fn test_first_limits_to_one_row() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1)]);
    let row = q.where_eq("id", 1).first().await.unwrap();
    assert_eq!(row, Some(id_row(1)));
    assert_eq!(fake.last().sql, r#"select * from "users" where "id" = ? limit 1"#);
}

#[tokio::test]
async fn test_sole_requires_exactly_one_row() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2)]);
    assert!(matches!(
        q.clone().sole().await,
        Err(QueryError::TooManyRows { .. })
    ));
    assert!(q.sole().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_exists() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("exists", true)])]);
    assert!(q.where_eq("id", 1).exists().await.unwrap());
    assert_eq!(
        fake.last().sql,
        r#"select exists(select * from "users" where "id" = ?) as "exists""#
    );
    assert!(q.doesnt_exist().await.unwrap());
}

#[tokio::test]
async fn test_pluck_with_key_keeps_first_position_and_last_value() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![
        Row::from_pairs([("name", Value::from("a")), ("id", Value::Int(1))]),
        Row::from_pairs([("name", Value::from("b")), ("id", Value::Int(2))]),
        Row::from_pairs([("name", Value::from("c")), ("id", Value::Int(1))]),
    ]);
    let pairs = q.pluck_with_key("users.name", "id").await.unwrap();
    assert_eq!(
        pairs,
        vec![
            (Value::Int(1), Value::from("c")),
            (Value::Int(2), Value::from("b")),
        ]
    );
    assert_eq!(fake.last().sql, r#"select "users"."name", "id" from "users""#);
    assert!(q.columns.is_none());
}

#[tokio::test]
async fn test_after_query_filters_rows() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2), id_row(3)]);
    q.after_query(|rows| {
        rows.into_iter()
            .filter(|row| row.get("id") != Some(&Value::Int(2)))
            .collect()
    });
    let rows = q.get().await.unwrap();
    assert_eq!(rows, vec![id_row(1), id_row(3)]);
}

#[tokio::test]
async fn test_cursor_applies_callbacks_per_row() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2), id_row(3)]);
    q.after_query(|rows| {
        rows.into_iter()
            .filter(|row| row.get("id") != Some(&Value::Int(2)))
            .collect()
    });
    let stream = q.cursor().await.unwrap();
    let rows: Vec<Row> = stream.map(|row| row.unwrap()).collect().await;
    assert_eq!(rows, vec![id_row(1), id_row(3)]);
    assert_eq!(fake.last().kind, "cursor");
}

#[tokio::test]
async fn test_group_row_is_stripped_from_results() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("id", 1), ("group_row", 1)])]);
    let rows = q.group_limit(1, "team_id").get().await.unwrap();
    assert_eq!(rows, vec![id_row(1)]);
}

#[tokio::test]
async fn test_chunk_pages_until_a_short_page() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2)]);
    fake.push_result(vec![id_row(3)]);
    q.order_by("id", "asc").unwrap();

    let mut seen = Vec::new();
    let finished = q
        .chunk(2, |rows, page| {
            seen.push((page, rows.len()));
            true
        })
        .await
        .unwrap();
    assert!(finished);
    assert_eq!(seen, vec![(1, 2), (2, 1)]);

    let statements = fake.recorded();
    assert_eq!(
        statements[0].sql,
        r#"select * from "users" order by "id" asc limit 2 offset 0"#
    );
    assert_eq!(
        statements[1].sql,
        r#"select * from "users" order by "id" asc limit 2 offset 2"#
    );
}

#[tokio::test]
async fn test_chunk_requires_an_order() {
    let mut q = users();
    let err = q.chunk(10, |_, _| true).await.unwrap_err();
    assert!(matches!(err, QueryError::MissingOrderBy));
}

#[tokio::test]
async fn test_chunk_by_id_pages_on_the_key() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2)]);
    fake.push_result(Vec::new());

    let stopped = q
        .chunk_by_id(2, |_, _| true, None, None)
        .await
        .unwrap();
    assert!(stopped);
    let statements = fake.recorded();
    assert_eq!(statements[0].sql, r#"select * from "users" order by "id" asc limit 2"#);
    assert_eq!(
        statements[1].sql,
        r#"select * from "users" where "id" > ? order by "id" asc limit 2"#
    );
    assert_eq!(statements[1].bindings, vec![Value::Int(2)]);
}

#[tokio::test]
async fn test_insert_and_insert_many() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    assert!(
        q.insert([("email", Value::from("a@example.com")), ("votes", Value::Int(0))])
            .await
            .unwrap()
    );
    assert_eq!(
        fake.last().sql,
        r#"insert into "users" ("email", "votes") values (?, ?)"#
    );

    q.insert_many([
        vec![("votes", Value::Int(1)), ("email", Value::from("b"))],
        vec![("email", Value::from("c")), ("votes", Value::Int(2))],
    ])
    .await
    .unwrap();
    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"insert into "users" ("email", "votes") values (?, ?), (?, ?)"#
    );
    assert_eq!(
        last.bindings,
        vec![Value::from("b"), Value::Int(1), Value::from("c"), Value::Int(2)]
    );

    let before = fake.recorded().len();
    assert!(q.insert(Vec::<(String, Value)>::new()).await.unwrap());
    assert_eq!(fake.recorded().len(), before);
}

#[tokio::test]
async fn test_insert_get_id_reads_returning_column() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("id", 42)])]);
    let id = q
        .insert_get_id([("email", "x@example.com")], None)
        .await
        .unwrap();
    assert_eq!(id, Value::Int(42));
    let last = fake.last();
    assert_eq!(last.kind, "select_write");
    assert_eq!(last.sql, r#"insert into "users" ("email") values (?) returning "id""#);
}

#[tokio::test]
async fn test_update_increment_and_delete() {
    let (fake, mut q) = users_on(FakeConnection::postgres().with_affected(2));
    let affected = q.clone().where_eq("id", 1).update([("votes", 5)]).await.unwrap();
    assert_eq!(affected, 2);
    let last = fake.last();
    assert_eq!(last.sql, r#"update "users" set "votes" = ? where "id" = ?"#);
    assert_eq!(last.bindings, vec![Value::Int(5), Value::Int(1)]);

    q.clone().where_eq("id", 1).increment("votes", 1).await.unwrap();
    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"update "users" set "votes" = "votes" + 1 where "id" = ?"#
    );
    assert_eq!(last.bindings, vec![Value::Int(1)]);

    let err = q.clone().increment("votes", "lots").await.unwrap_err();
    assert!(matches!(err, QueryError::NonNumericAmount(column) if column == "votes"));

    q.delete(Some(Value::Int(5))).await.unwrap();
    let last = fake.last();
    assert_eq!(last.sql, r#"delete from "users" where "users"."id" = ?"#);
    assert_eq!(last.bindings, vec![Value::Int(5)]);
}

#[tokio::test]
async fn test_upsert() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    q.upsert(
        [vec![("email", Value::from("a")), ("votes", Value::Int(1))]],
        &["email"],
        Some(vec![UpsertUpdate::from("votes"), UpsertUpdate::from(("seen", true))]),
    )
    .await
    .unwrap();
    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"insert into "users" ("email", "votes") values (?, ?) on conflict ("email") do update set "votes" = "excluded"."votes", "seen" = ?"#
    );
    assert_eq!(
        last.bindings,
        vec![Value::from("a"), Value::Int(1), Value::Bool(true)]
    );
}

#[tokio::test]
async fn test_upsert_is_unsupported_without_a_dialect() {
    let (_fake, mut q) = users_on(FakeConnection::standard());
    let err = q
        .upsert([vec![("email", "a")]], &["email"], None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[tokio::test]
async fn test_update_or_insert_inserts_when_missing() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("exists", false)])]);
    q.update_or_insert([("email", "a")], [("votes", 1)])
        .await
        .unwrap();
    let last = fake.last();
    assert_eq!(last.sql, r#"insert into "users" ("email", "votes") values (?, ?)"#);
    assert_eq!(last.bindings, vec![Value::from("a"), Value::Int(1)]);
}

#[tokio::test]
async fn test_truncate() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    q.truncate().await.unwrap();
    assert_eq!(fake.last().sql, r#"truncate "users" restart identity"#);
}

// ===== pagination =====

#[tokio::test]
async fn test_paginate_counts_then_fetches_the_page() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![Row::from_pairs([("aggregate", 5)])]);
    fake.push_result(vec![id_row(3), id_row(4)]);
    q.where_("votes", ">", 1).unwrap().order_by("id", "asc").unwrap();

    let page = q.paginate(2, 2).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.items.len(), 2);

    let statements = fake.recorded();
    assert_eq!(
        statements[0].sql,
        r#"select count(*) as aggregate from "users" where "votes" > ?"#
    );
    assert_eq!(
        statements[1].sql,
        r#"select * from "users" where "votes" > ? order by "id" asc limit 2 offset 2"#
    );
}

#[tokio::test]
async fn test_paginate_skips_the_page_query_when_empty() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    let page = q.paginate(0, 0).await.unwrap();
    assert_eq!(page.per_page, 15);
    assert_eq!(page.current_page, 1);
    assert_eq!(fake.recorded().len(), 1);
}

#[tokio::test]
async fn test_grouped_pagination_count_uses_a_derived_table() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    q.select(["status"])
        .group_by(["status"])
        .having_raw("count(*) > ?", [Value::Int(1)])
        .order_by("status", "asc")
        .unwrap()
        .limit(5);
    q.get_count_for_pagination(["*"]).await.unwrap();

    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"select count(*) as aggregate from (select "status" from "users" group by "status" having count(*) > ?) as "aggregate_table""#
    );
    assert_eq!(last.bindings, vec![Value::Int(1)]);
}

#[tokio::test]
async fn test_simple_paginate_fetches_one_extra_row() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2), id_row(3)]);
    let page = q.simple_paginate(2, 1).await.unwrap();
    assert!(page.has_more_pages());
    assert_eq!(page.items.len(), 2);
    assert_eq!(fake.last().sql, r#"select * from "users" limit 3 offset 0"#);
}

#[tokio::test]
async fn test_paginating_with_the_largest_page_size_saturates_the_limit() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1)]);
    let page = q.simple_paginate(u64::MAX, 1).await.unwrap();
    assert!(!page.has_more_pages());
    assert_eq!(
        fake.last().sql,
        r#"select * from "users" limit 18446744073709551615 offset 0"#
    );

    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1)]);
    q.order_by("id", "asc").unwrap();
    q.cursor_paginate(u64::MAX, None).await.unwrap();
    assert_eq!(
        fake.last().sql,
        r#"select * from "users" order by "id" asc limit 18446744073709551615"#
    );
}

#[tokio::test]
async fn test_cursor_paginate_requires_an_order() {
    let mut q = users();
    let err = q.cursor_paginate(10, None).await.unwrap_err();
    assert!(matches!(err, QueryError::MissingOrderBy));
}

#[tokio::test]
async fn test_cursor_paginate_first_page() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(1), id_row(2), id_row(3)]);
    q.order_by("id", "asc").unwrap();

    let page = q.cursor_paginate(2, None).await.unwrap();
    assert_eq!(fake.last().sql, r#"select * from "users" order by "id" asc limit 3"#);
    let next = page.next_cursor().unwrap().unwrap();
    assert_eq!(next.parameter("id").unwrap(), Value::Int(2));
}

#[tokio::test]
async fn test_cursor_paginate_compares_every_ordered_column() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    q.order_by("name", "asc").unwrap().order_by_desc("id");
    let cursor = Cursor::new(
        vec![
            ("name".to_string(), Value::from("b")),
            ("id".to_string(), Value::Int(5)),
        ],
        true,
    );
    q.cursor_paginate(10, Some(cursor)).await.unwrap();

    let last = fake.last();
    assert_eq!(
        last.sql,
        r#"select * from "users" where ("name" > ? or ("name" = ? and ("id" < ?))) order by "name" asc, "id" desc limit 11"#
    );
    assert_eq!(
        last.bindings,
        vec![Value::from("b"), Value::from("b"), Value::Int(5)]
    );
}

#[tokio::test]
async fn test_cursor_paginate_backwards_flips_the_order() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    fake.push_result(vec![id_row(4), id_row(3)]);
    q.order_by("id", "asc").unwrap();
    let cursor = Cursor::new(vec![("id".to_string(), Value::Int(5))], false);

    let page = q.cursor_paginate(2, Some(cursor)).await.unwrap();
    assert_eq!(
        fake.last().sql,
        r#"select * from "users" where ("id" < ?) order by "id" desc limit 3"#
    );
    assert_eq!(page.items, vec![id_row(3), id_row(4)]);
}

#[tokio::test]
async fn test_cursor_paginate_resolves_select_aliases() {
    let (fake, mut q) = users_on(FakeConnection::postgres());
    q.select(["users.id as user_id"]).order_by("user_id", "asc").unwrap();
    let cursor = Cursor::new(vec![("user_id".to_string(), Value::Int(3))], true);
    q.cursor_paginate(5, Some(cursor)).await.unwrap();
    assert_eq!(
        fake.last().sql,
        r#"select "users"."id" as "user_id" from "users" where ("users"."id" > ?) order by "user_id" asc limit 6"#
    );
}

#[tokio::test]
async fn test_cursor_paginate_missing_parameter() {
    let mut q = users();
    q.order_by("id", "asc").unwrap();
    let cursor = Cursor::new(vec![("name".to_string(), Value::from("x"))], true);
    let err = q.cursor_paginate(5, Some(cursor)).await.unwrap_err();
    assert!(matches!(err, QueryError::MissingCursorParameter(name) if name == "id"));
}

#[test]
fn test_raw_expression_values_are_not_bound() {
    let mut q = users();
    q.where_eq("updated_at", Expression::new("now()"));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "updated_at" = now()"#
    );
    assert!(q.get_bindings().is_empty());
}
