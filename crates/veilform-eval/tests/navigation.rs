use serde_json::json;
use veilform_common::{ResponseValue, SurveyError};
use veilform_eval::{SurveyInterpreter, SurveySession, repeat_varname};
use veilform_form::{FormTree, NodeSpec, load_form};

fn tree(value: serde_json::Value) -> FormTree {
    let spec: NodeSpec = serde_json::from_value(value).unwrap();
    load_form(&spec).unwrap()
}

fn linear_form() -> FormTree {
    tree(json!({
        "name": "holidays", "type": "survey",
        "children": [
            {"name": "intro", "type": "note", "label": "Welcome"},
            {"name": "name", "type": "text"},
            {"name": "age", "type": "integer"},
        ]
    }))
}

#[test]
fn linear_walk_visits_every_displayable_element() {
    let form = linear_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    assert!(interp.survey_start());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "intro");
    assert_eq!(interp.element_type().unwrap(), "note");
    assert!(interp.to_show().unwrap());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "name");
    assert_eq!(interp.element_type().unwrap(), "text");
    assert!(!interp.required().unwrap());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "age");
    interp.advance().unwrap();
    assert!(interp.survey_end());
}

#[test]
fn back_returns_to_the_previous_element() {
    let form = linear_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    interp.advance().unwrap();
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "age");
    interp.retreat().unwrap();
    assert_eq!(interp.current_name(), "name");
}

#[test]
fn back_from_the_first_element_stops_at_survey_start() {
    let form = linear_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "intro");
    interp.retreat().unwrap();
    assert!(interp.survey_start());
    // The host-facing "refresh" pattern: next() recovers the first element
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "intro");
}

#[test]
fn relevance_skips_and_keeps_skipped_values_out_of_the_response() {
    let form = tree(json!({
        "name": "s", "type": "survey",
        "children": [
            {"name": "consent", "type": "select one",
             "choices": [{"name": "yes"}, {"name": "no"}]},
            {"name": "details", "type": "text",
             "bind": {"relevant": "${consent}='yes'"}},
            {"name": "wrapup", "type": "note", "label": "Thanks"},
        ]
    }));
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "consent");
    assert!(interp.set_value(ResponseValue::from("no")).unwrap());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "wrapup");

    // Even a value pushed in through the session directly stays out of the
    // gathered response: the skipped element holds no visit
    session.store_response("details", Some(ResponseValue::from("sneaky")));
    let mut interp = SurveyInterpreter::new(&form, &mut session);
    let response = interp.gather_survey_response();
    assert!(response.contains_key("consent"));
    assert!(!response.contains_key("details"));
}

#[test]
fn constraints_reject_and_keep_the_prior_value() {
    let form = tree(json!({
        "name": "s", "type": "survey",
        "children": [
            {"name": "age", "type": "integer",
             "bind": {"constraint": ". >= 0 and . <= 120",
                      "jr:constraintMsg": "Age must be between 0 and 120"}},
        ]
    }));
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "age");

    assert!(!interp.set_value(ResponseValue::Int(-1)).unwrap());
    assert_eq!(
        interp.current_value().unwrap_err(),
        SurveyError::ValueMissing { name: "age".into() }
    );
    assert!(interp.set_value(ResponseValue::Int(42)).unwrap());
    assert_eq!(interp.current_value().unwrap(), ResponseValue::Int(42));
    // Constraint re-applies against the stored value
    assert!(!interp.set_value(ResponseValue::Int(200)).unwrap());
    assert_eq!(interp.current_value().unwrap(), ResponseValue::Int(42));
    assert_eq!(
        interp.constraint_message().unwrap(),
        "Age must be between 0 and 120"
    );
}

fn repeat_form() -> FormTree {
    tree(json!({
        "name": "s", "type": "survey",
        "children": [
            {"name": "n_kids", "type": "integer"},
            {"name": "kids", "type": "repeat",
             "control": {"jr:count": "${n_kids}"},
             "children": [
                {"name": "kid.name", "type": "text"},
                {"name": "kid.age", "type": "integer"},
             ]},
            {"name": "done", "type": "note", "label": "Done"},
        ]
    }))
}

#[test]
fn repeats_iterate_count_times_and_expose_per_iteration_values() {
    let form = repeat_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert!(interp.set_value(ResponseValue::Int(2)).unwrap());

    for (kid_name, kid_age) in [("a", 1), ("b", 2)] {
        interp.advance().unwrap();
        assert_eq!(interp.current_name(), "kid.name");
        assert!(interp.set_value(ResponseValue::from(kid_name)).unwrap());
        interp.advance().unwrap();
        assert_eq!(interp.current_name(), "kid.age");
        assert!(interp.set_value(ResponseValue::Int(kid_age)).unwrap());
    }
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "done");

    let response = interp.gather_survey_response();
    assert_eq!(
        response[&repeat_varname("kid.name")],
        ResponseValue::List(vec![ResponseValue::from("a"), ResponseValue::from("b")])
    );
    assert_eq!(
        response[&repeat_varname("kid.age")],
        ResponseValue::List(vec![ResponseValue::Int(1), ResponseValue::Int(2)])
    );
}

#[test]
fn shrinking_the_count_truncates_auxiliary_lists() {
    let form = repeat_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert!(interp.set_value(ResponseValue::Int(3)).unwrap());
    for name in ["a", "b", "c"] {
        interp.advance().unwrap();
        assert!(interp.set_value(ResponseValue::from(name)).unwrap());
        interp.advance().unwrap();
        assert!(interp.set_value(ResponseValue::Int(1)).unwrap());
    }
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "done");

    // Walk back to n_kids and shrink the count
    while interp.current_name() != "n_kids" {
        interp.retreat().unwrap();
    }
    assert!(interp.set_value(ResponseValue::Int(1)).unwrap());

    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "kid.name");
    assert_eq!(interp.current_value().unwrap(), ResponseValue::from("a"));
    interp.advance().unwrap();
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "done");

    let response = interp.gather_survey_response();
    assert_eq!(
        response[&repeat_varname("kid.name")],
        ResponseValue::List(vec![ResponseValue::from("a")])
    );
    assert_eq!(
        response[&repeat_varname("kid.age")],
        ResponseValue::List(vec![ResponseValue::Int(1)])
    );
}

#[test]
fn a_zero_count_repeat_is_skipped_entirely() {
    let form = repeat_form();
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert!(interp.set_value(ResponseValue::Int(0)).unwrap());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "done");
}

#[test]
fn calculates_store_without_displaying() {
    let form = tree(json!({
        "name": "s", "type": "survey",
        "children": [
            {"name": "a", "type": "integer"},
            {"name": "double.a", "type": "calculate",
             "bind": {"calculate": "${a} * 2"}},
            {"name": "review", "type": "note", "label": "You said ${double.a}"},
        ]
    }));
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert!(interp.set_value(ResponseValue::Int(21)).unwrap());
    interp.advance().unwrap();
    assert_eq!(interp.current_name(), "review");
    assert_eq!(interp.value("double.a").unwrap(), ResponseValue::Int(42));
    assert_eq!(interp.label().unwrap(), "You said 42");

    let response = interp.gather_survey_response();
    assert_eq!(response["double.a"], ResponseValue::Int(42));
}

#[test]
fn walk_terminates_on_every_accepted_form() {
    // A form mixing groups, repeats, calculates, and skips still reaches the
    // end in finitely many steps
    let form = tree(json!({
        "name": "s", "type": "survey",
        "children": [
            {"name": "g", "type": "group", "children": [
                {"name": "x", "type": "integer"},
                {"name": "skipped", "type": "text", "bind": {"relevant": "${x} > 10"}},
            ]},
            {"name": "r", "type": "repeat", "control": {"jr:count": "2"},
             "children": [{"name": "r.q", "type": "text"}]},
            {"name": "end.note", "type": "note", "label": "bye"},
        ]
    }));
    let mut session = SurveySession::new();
    let mut interp = SurveyInterpreter::new(&form, &mut session);

    interp.advance().unwrap();
    assert!(interp.set_value(ResponseValue::Int(5)).unwrap());
    let mut steps = 0;
    while !interp.survey_end() {
        interp.advance().unwrap();
        if interp.current_name() == "r.q" {
            assert!(interp.set_value(ResponseValue::from("v")).unwrap());
        }
        steps += 1;
        assert!(steps < 100, "walk did not terminate");
    }
    assert!(steps <= 5);
}
