use std::cmp::Ordering;

use chrono::NaiveDate;
use rql::{
    JsonAccessor, Number, Parser, PropertyAccessor, QueryCompiler, QueryPlan, Value,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    first_name: &'static str,
    last_name: &'static str,
    birth_date: NaiveDate,
    age: i64,
    gender: &'static str,
    nationality: &'static str,
    languages: &'static [&'static str],
}

fn person(
    first_name: &'static str,
    last_name: &'static str,
    (year, month, day): (i32, u32, u32),
    age: i64,
    gender: &'static str,
    nationality: &'static str,
    languages: &'static [&'static str],
) -> Person {
    Person {
        first_name,
        last_name,
        birth_date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        age,
        gender,
        nationality,
        languages,
    }
}

const ENGLISH: &[&str] = &["English"];
const SPANISH: &[&str] = &["Spanish", "English"];
const VIETNAMESE: &[&str] = &["English", "Vietnamese"];

fn people() -> Vec<Person> {
    vec![
        person("Harry", "Smith", (1954, 3, 18), 61, "Male", "English", ENGLISH),
        person("Jill", "Smith", (2001, 1, 16), 14, "Female", "English", ENGLISH),
        person("Oliver", "Smith", (1930, 2, 12), 85, "Male", "English", ENGLISH),
        person("Davo", "Jones", (1976, 11, 21), 39, "Male", "Australian", ENGLISH),
        person("Dazza", "Williams", (1985, 11, 17), 30, "Male", "Australian", ENGLISH),
        person("Shazza", "Taylor", (1987, 9, 29), 28, "Female", "Australian", ENGLISH),
        person("Shazza", "Smith", (1917, 9, 20), 98, "Female", "Australian", ENGLISH),
        person("D\u{169}ng", "Nguy\u{1ec5}n", (1943, 8, 16), 72, "Male", "Australian", VIETNAMESE),
        person("Manuel", "Mu\u{f1}oz", (2000, 12, 21), 14, "Male", "Spanish", SPANISH),
        person("Jos\u{e9}", "Rodr\u{ed}guez", (1960, 1, 2), 55, "Male", "Spanish", SPANISH),
        person("Dolores", "Garc\u{ed}a", (1976, 10, 3), 38, "Female", "Spanish", SPANISH),
        person("Mar\u{ed}a", "Garc\u{ed}a", (2005, 4, 7), 10, "Female", "Spanish", SPANISH),
        person("Billy", "Brown", (1950, 9, 11), 65, "Male", "American", ENGLISH),
        person("Betty", "Brown", (1985, 7, 10), 30, "Female", "American", ENGLISH),
        person("Madison", "Miller", (1972, 3, 28), 43, "Female", "American", ENGLISH),
        person("Jayden", "Davis", (2005, 12, 23), 9, "Male", "American", ENGLISH),
    ]
}

struct PersonAccessor;

impl PropertyAccessor<Person> for PersonAccessor {
    fn get(&self, item: &Person, property: &str) -> Value {
        match property {
            "firstName" => Value::String(item.first_name.to_string()),
            "lastName" => Value::String(item.last_name.to_string()),
            "birthDate" => Value::Date(item.birth_date),
            "age" => Value::Number(Number::Integer(item.age)),
            "gender" => Value::String(item.gender.to_string()),
            "nationality" => Value::String(item.nationality.to_string()),
            "languages" => Value::Array(
                item.languages
                    .iter()
                    .map(|l| Value::String(l.to_string()))
                    .collect(),
            ),
            _ => Value::Null,
        }
    }
}

fn plan(query: &str) -> QueryPlan<Person> {
    let node = Parser::new()
        .parse(query)
        .unwrap_or_else(|e| panic!("'{}' should parse: {}", query, e));
    QueryCompiler::new(PersonAccessor)
        .compile(&node)
        .unwrap_or_else(|e| panic!("'{}' should compile: {}", query, e))
}

fn run(query: &str) -> Vec<Person> {
    plan(query).apply(people())
}

#[test]
fn and_of_two_equals() {
    let results = run("firstName=Shazza&lastName=Smith");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].last_name, "Smith");
    assert_eq!(results[0].first_name, "Shazza");
}

#[test]
fn and_with_greater_than() {
    let results = run("firstName=Shazza&age>50");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].last_name, "Smith");
}

#[test]
fn or_grouping_with_conjunction() {
    let results = run("(firstName=Jill|firstName=Davo)&nationality=Australian");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].first_name, "Davo");
}

#[test]
fn sort_descending() {
    let results = run("sort(-firstName)");
    assert_eq!(results.len(), people().len());
    assert_eq!(results[0].first_name, "Shazza");
}

#[test]
fn sort_is_lexicographic_over_keys() {
    let results = run("sort(+lastName,-firstName)");
    assert_eq!(results.len(), people().len());
    assert_eq!(results[0].first_name, "Billy");
    assert_eq!(results[1].first_name, "Betty");
}

#[test]
fn sort_is_stable() {
    // all Smiths share the sort key; input order must be preserved
    let results = run("lastName=Smith&sort(+lastName)");
    let names: Vec<&str> = results.iter().map(|p| p.first_name).collect();
    assert_eq!(names, vec!["Harry", "Jill", "Oliver", "Shazza"]);
}

#[test]
fn limit_truncates() {
    let results = run("limit(10)");
    assert_eq!(results.len(), 10);
    assert_eq!(results, people()[..10].to_vec());
}

#[test]
fn limit_count_comes_before_offset() {
    let all = people();
    let results = run("limit(5,9)");
    assert_eq!(results.len(), 5);
    assert_eq!(results[0], all[9]);
    assert_eq!(results[4], all[13]);
}

#[test]
fn limit_past_the_end_clamps() {
    let results = run("limit(10,15)");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].first_name, "Jayden");

    assert!(run("limit(10,100)").is_empty());
}

#[test]
fn empty_query_returns_input_unchanged() {
    assert_eq!(run(""), people());
}

#[test]
fn wildcard_match_is_case_insensitive() {
    let results = run("firstName=match=sh*");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|p| p.first_name == "Shazza"));

    // '?' matches exactly one character
    let results = run("match(firstName,Bill?)");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].first_name, "Billy");
}

#[test]
fn like_accepts_regex_values() {
    let results = run("like(firstName,re:d.*)");
    let names: Vec<&str> = results.iter().map(|p| p.first_name).collect();
    assert_eq!(names, vec!["Davo", "Dazza", "D\u{169}ng", "Dolores"]);

    // case-sensitive regex matches nothing lowercase
    assert!(run("like(firstName,RE:d.*)").is_empty());
}

#[test]
fn in_tests_set_membership() {
    let results = run("in(nationality,(Spanish,American))");
    assert_eq!(results.len(), 8);

    // flat trailing list form
    let results = run("in(nationality,Spanish,American)");
    assert_eq!(results.len(), 8);
}

#[test]
fn contains_tests_collection_properties() {
    let results = run("contains(languages,Spanish)");
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|p| p.nationality == "Spanish"));

    // non-collection property never contains anything
    assert!(run("contains(firstName,Shazza)").is_empty());
}

#[test]
fn not_negates_its_predicate() {
    let results = run("not(gender=Male)");
    assert_eq!(results.len(), 7);
    assert!(results.iter().all(|p| p.gender == "Female"));
}

#[test]
fn date_valued_comparisons() {
    let results = run("birthDate>2000-01-01");
    assert_eq!(results.len(), 4);
    assert!(
        results
            .iter()
            .all(|p| p.birth_date > NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
    );
}

#[test]
fn full_pipeline_filters_sorts_and_pages() {
    let results = run("gender=Male&sort(+age)&limit(3,1)");
    let names: Vec<&str> = results.iter().map(|p| p.first_name).collect();
    // males by age: Jayden 9, Manuel 14, Dazza 30, Davo 39, ...
    assert_eq!(names, vec!["Manuel", "Dazza", "Davo"]);
}

#[test]
fn unknown_properties_compare_as_null_and_drop_out() {
    assert!(run("shoeSize>10").is_empty());
    // ne against null is true for everyone: null equals nothing non-null
    assert_eq!(run("shoeSize!=10").len(), people().len());
}

#[test]
fn plans_are_reusable_across_collections() {
    let p = plan("age>50");
    assert_eq!(p.apply(people()).len(), 6);
    assert_eq!(p.apply(people()[..4].to_vec()).len(), 2);
}

#[test]
fn per_property_comparators_can_be_overridden() {
    struct CaseInsensitiveNames;

    impl PropertyAccessor<Person> for CaseInsensitiveNames {
        fn get(&self, item: &Person, property: &str) -> Value {
            PersonAccessor.get(item, property)
        }

        fn compare(&self, property: &str, a: &Value, b: &Value) -> Ordering {
            if property == "firstName" {
                if let (Value::String(a), Value::String(b)) = (a, b) {
                    return a.to_lowercase().cmp(&b.to_lowercase());
                }
            }
            rql::value::compare(a, b)
        }
    }

    let node = Parser::new().parse("firstName=shazza").unwrap();
    let plan = QueryCompiler::new(CaseInsensitiveNames).compile(&node).unwrap();
    assert_eq!(plan.apply(people()).len(), 2);
}

#[test]
fn json_documents_filter_through_the_built_in_accessor() {
    let docs = vec![
        json!({"firstName": "Shazza", "lastName": "Smith", "age": 98}),
        json!({"firstName": "Shazza", "lastName": "Taylor", "age": 28}),
        json!({"firstName": "Jack", "lastName": "Jones", "age": 40}),
    ];

    let node = Parser::new().parse("firstName=Shazza&age>50").unwrap();
    let plan = QueryCompiler::new(JsonAccessor).compile(&node).unwrap();
    let results = plan.apply(docs);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["lastName"], "Smith");
}
