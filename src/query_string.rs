use std::collections::HashMap;

use url::form_urlencoded;

use crate::chart::ChartType;
use crate::comparison::Comparison;
use crate::course_class_set::CourseClassSet;
use crate::results::Results;

const CLASS_KEY: &str = "class";
const CHART_TYPE_KEY: &str = "chartType";
const COMPARE_WITH_KEY: &str = "compareWith";
const SELECTED_KEY: &str = "selected";
const STATS_KEY: &str = "stats";
const SHOW_ORIGINAL_KEY: &str = "showOriginal";
const FILTER_TEXT_KEY: &str = "filterText";

const ALL_KEYS: [&str; 7] = [
    CLASS_KEY,
    CHART_TYPE_KEY,
    COMPARE_WITH_KEY,
    SELECTED_KEY,
    STATS_KEY,
    SHOW_ORIGINAL_KEY,
    FILTER_TEXT_KEY,
];

const LIST_SEPARATOR: char = ';';
const ALL_SELECTED: &str = "*";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Which statistics the results view shows next to each competitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsFlags {
    pub total_time: bool,
    pub split_time: bool,
    pub behind_fastest: bool,
    pub time_loss: bool,
}

impl Default for StatisticsFlags {
    fn default() -> Self {
        StatisticsFlags {
            total_time: true,
            split_time: true,
            behind_fastest: true,
            time_loss: false,
        }
    }
}

impl StatisticsFlags {
    fn named(&self) -> [(&'static str, bool); 4] {
        [
            ("TotalTime", self.total_time),
            ("SplitTime", self.split_time),
            ("BehindFastest", self.behind_fastest),
            ("TimeLoss", self.time_loss),
        ]
    }

    fn encode(&self) -> String {
        self.named()
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// `None` if any non-empty name is unrecognised
    fn decode(value: &str) -> Option<StatisticsFlags> {
        let mut flags = StatisticsFlags {
            total_time: false,
            split_time: false,
            behind_fastest: false,
            time_loss: false,
        };
        for name in value.split(LIST_SEPARATOR) {
            match name {
                "TotalTime" => flags.total_time = true,
                "SplitTime" => flags.split_time = true,
                "BehindFastest" => flags.behind_fastest = true,
                "TimeLoss" => flags.time_loss = true,
                "" => {}
                _ => return None,
            }
        }
        Some(flags)
    }
}

/// Everything a shareable link records about the current view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Indexes into `Results::classes`; all on one course
    pub classes: Vec<usize>,
    pub chart_type: ChartType,
    pub comparison: Comparison,
    /// Indexes into the course-class set built from `classes`
    pub selected: Vec<usize>,
    pub stats: StatisticsFlags,
    pub show_original: bool,
    pub filter_text: String,
}

impl ViewState {
    /// First class, splits graph, fastest-time comparison, nothing selected
    pub fn default_for(results: &Results) -> ViewState {
        ViewState {
            classes: if results.classes.is_empty() { Vec::new() } else { vec![0] },
            chart_type: ChartType::SplitsGraph,
            comparison: Comparison::FastestTime,
            selected: Vec::new(),
            stats: StatisticsFlags::default(),
            show_original: false,
            filter_text: String::new(),
        }
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Writes the view into a query string. Parameters of `existing` that this
/// codec does not own are kept; its own parameters are replaced.
pub fn encode_query(existing: &str, results: &Results, set: &CourseClassSet<'_>, state: &ViewState) -> String {
    let existing = existing.trim_start_matches('?').trim_start_matches('&');
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(existing.as_bytes()) {
        if !ALL_KEYS.contains(&&*key) {
            serializer.append_pair(&key, &value);
        }
    }

    let class_names: Vec<&str> = state
        .classes
        .iter()
        .filter_map(|&index| results.classes.get(index))
        .map(|class| class.name.as_str())
        .collect();
    serializer.append_pair(CLASS_KEY, &class_names.join(";"));
    serializer.append_pair(CHART_TYPE_KEY, state.chart_type.key());

    let comparison = match state.comparison {
        Comparison::Competitor(index) => set.competitor(index).map(|c| c.full_name()),
        builtin => builtin.key(),
    };
    if let Some(comparison) = comparison {
        serializer.append_pair(COMPARE_WITH_KEY, &comparison);
    }

    if !state.selected.is_empty() {
        if state.selected.len() == set.len() {
            serializer.append_pair(SELECTED_KEY, ALL_SELECTED);
        } else {
            let names: Vec<String> = state
                .selected
                .iter()
                .filter_map(|&index| set.competitor(index))
                .map(|c| c.full_name())
                .collect();
            serializer.append_pair(SELECTED_KEY, &names.join(";"));
        }
    }

    serializer.append_pair(STATS_KEY, &state.stats.encode());
    if state.show_original {
        serializer.append_pair(SHOW_ORIGINAL_KEY, "1");
    }
    if !state.filter_text.is_empty() {
        serializer.append_pair(FILTER_TEXT_KEY, &state.filter_text);
    }

    serializer.finish().trim_start_matches('&').to_string()
}

// ============================================================================
// DECODING
// ============================================================================

/// Reads a view from a query string. Unknown parameters are ignored and
/// anything missing or unusable takes its default.
pub fn decode_query(query: &str, results: &Results) -> ViewState {
    let query = query.trim_start_matches('?');
    let mut params: HashMap<String, String> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if ALL_KEYS.contains(&&*key) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    }

    let mut state = ViewState::default_for(results);

    if let Some(classes) = params.get(CLASS_KEY).and_then(|names| read_classes(names, results)) {
        state.classes = classes;
    }
    if let Some(chart_type) = params.get(CHART_TYPE_KEY).and_then(|key| ChartType::from_key(key)) {
        state.chart_type = chart_type;
    }
    if let Some(stats) = params.get(STATS_KEY).and_then(|value| StatisticsFlags::decode(value)) {
        state.stats = stats;
    }
    state.show_original = params.get(SHOW_ORIGINAL_KEY).map_or(false, |value| value == "1");
    if let Some(filter_text) = params.get(FILTER_TEXT_KEY) {
        state.filter_text = filter_text.clone();
    }

    let set = match results.course_class_set(&state.classes) {
        Ok(set) => set,
        Err(_) => return state,
    };
    if let Some(comparison) = params.get(COMPARE_WITH_KEY).and_then(|value| read_comparison(value, &set)) {
        state.comparison = comparison;
    }
    if let Some(selected) = params.get(SELECTED_KEY) {
        state.selected = read_selected(selected, &set);
    }
    state
}

/// Known class names, duplicates dropped, limited to the first one's course
fn read_classes(names: &str, results: &Results) -> Option<Vec<usize>> {
    let mut classes: Vec<usize> = Vec::new();
    for index in names.split(LIST_SEPARATOR).filter_map(|name| results.class_index(name)) {
        if !classes.contains(&index) {
            classes.push(index);
        }
    }
    let course = results.classes[*classes.first()?].course;
    classes.retain(|&index| results.classes[index].course == course);
    Some(classes)
}

/// A built-in comparison, or a completing competitor named in the set
fn read_comparison(value: &str, set: &CourseClassSet<'_>) -> Option<Comparison> {
    match Comparison::from_key(value) {
        Some(Comparison::Winner) if !set.has_completers() => None,
        Some(comparison) => Some(comparison),
        None => set
            .competitors()
            .position(|c| c.full_name() == value && c.completed())
            .map(Comparison::Competitor),
    }
}

fn read_selected(value: &str, set: &CourseClassSet<'_>) -> Vec<usize> {
    let names: Vec<&str> = value.split(LIST_SEPARATOR).collect();
    if names.contains(&ALL_SELECTED) {
        return (0..set.len()).collect();
    }
    let mut selected: Vec<usize> = set
        .competitors()
        .enumerate()
        .filter(|(_, c)| names.contains(&c.full_name().as_str()))
        .map(|(index, _)| index)
        .collect();
    selected.sort_unstable();
    selected
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::{Competitor, CompetitorName};
    use crate::course::Course;
    use crate::course_class::CourseClass;
    use crate::time::Time;

    fn competitor(order: usize, name: &str, cum: &[Option<i64>]) -> Competitor {
        Competitor::from_original_cum_times(
            order,
            CompetitorName::from_full_name(name),
            "",
            None,
            cum.iter().map(|v| v.map(Time::from_secs)).collect(),
        )
    }

    fn results() -> Results {
        let m21 = CourseClass::new(
            "M21",
            1,
            vec![
                competitor(1, "Ann Lee", &[Some(0), Some(60), Some(100)]),
                competitor(2, "Bob Ray", &[Some(0), None, Some(120)]),
            ],
        )
        .unwrap();
        let m40 = CourseClass::new("M40 Open", 1, vec![competitor(3, "Cy Fox", &[Some(0), Some(50), Some(110)])]).unwrap();
        let w21 = CourseClass::new("W21", 2, vec![competitor(4, "Di Nos", &[Some(0), None, None, None])]).unwrap();
        let long = Course::new("Long", vec![0, 1], None, None, None);
        let short = Course::new("Short", vec![2], None, None, None);
        Results::new(vec![m21, m40, w21], vec![long, short], Vec::new())
    }

    #[test]
    fn test_decode_full_query() {
        let results = results();
        let state = decode_query(
            "class=M21%3BM40+Open%3BW21&chartType=RaceGraph&compareWith=Cy+Fox&selected=Ann+Lee%3BCy+Fox\
             &stats=TotalTime%3BTimeLoss&showOriginal=1&filterText=lee&unknown=3",
            &results,
        );
        assert_eq!(state.classes, vec![0, 1]);
        assert_eq!(state.chart_type, ChartType::RaceGraph);
        // Set order: Ann (100), Cy (110), Bob (mispunch)
        assert_eq!(state.comparison, Comparison::Competitor(1));
        assert_eq!(state.selected, vec![0, 1]);
        assert!(state.stats.total_time && state.stats.time_loss && !state.stats.split_time);
        assert!(state.show_original);
        assert_eq!(state.filter_text, "lee");
    }

    #[test]
    fn test_decode_defaults_and_fallbacks() {
        let results = results();
        let state = decode_query("", &results);
        assert_eq!(state, ViewState::default_for(&results));

        let state = decode_query("class=Nope&chartType=Pie&compareWith=Bob+Ray&stats=Bogus&showOriginal=yes", &results);
        assert_eq!(state.classes, vec![0]);
        assert_eq!(state.chart_type, ChartType::SplitsGraph);
        // Bob did not complete
        assert_eq!(state.comparison, Comparison::FastestTime);
        assert_eq!(state.stats, StatisticsFlags::default());
        assert!(!state.show_original);

        let state = decode_query("class=W21&compareWith=Winner&selected=*", &results);
        assert_eq!(state.classes, vec![2]);
        assert_eq!(state.comparison, Comparison::FastestTime);
        assert_eq!(state.selected, vec![0]);
    }

    #[test]
    fn test_encode_replaces_own_keys_and_keeps_others() {
        let results = results();
        let set = results.course_class_set(&[0, 1]).unwrap();
        let state = ViewState {
            classes: vec![0, 1],
            chart_type: ChartType::PercentBehind,
            comparison: Comparison::FastestTimePlus(25),
            selected: vec![0, 2],
            stats: StatisticsFlags::default(),
            show_original: true,
            filter_text: "a b".to_string(),
        };
        let query = encode_query("?&event=42&class=Old&chartType=SplitsGraph", &results, &set, &state);
        assert_eq!(
            query,
            "event=42&class=M21%3BM40+Open&chartType=PercentBehind&compareWith=FastestTimePlus25\
             &selected=Ann+Lee%3BBob+Ray&stats=TotalTime%3BSplitTime%3BBehindFastest&showOriginal=1&filterText=a+b"
        );
        assert_eq!(decode_query(&query, &results), state);
    }

    #[test]
    fn test_encode_all_selected_as_star() {
        let results = results();
        let set = results.course_class_set(&[0]).unwrap();
        let mut state = ViewState::default_for(&results);
        state.selected = vec![0, 1];
        let query = encode_query("", &results, &set, &state);
        assert!(query.contains("selected=*"));
        assert!(!query.starts_with('&'));
        assert!(!query.contains("filterText"));
    }
}
