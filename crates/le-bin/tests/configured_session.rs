use core_config::load_from;
use core_construct::ConstructTracker;
use core_state::EditSession;
use pretty_assertions::assert_eq;

// A configured session: history depth and run limits come from lineedit.toml.
#[test]
fn config_limits_reach_the_session() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        "[buffer]\ninitial_capacity = 16\n[history]\nmax_depth = 2\ncoalesce_max_run = 2\n",
    )
    .unwrap();
    let config = load_from(Some(tmp.path().to_path_buf())).unwrap();
    let mut session = EditSession::with_options(config.buffer_options(), config.tracker_options());
    assert_eq!(session.buffer().capacity(), 16);

    for c in "abcdef".chars() {
        session.type_char(c).unwrap();
    }
    // three runs of two, only the newest two kept
    let mut undone = 0;
    while session.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 2);
    assert_eq!(session.text(), "ab");
}

// The session check and a line-by-line tracker agree on every prefix of a script.
#[test]
fn session_and_line_tracker_agree() {
    let script = [
        "case \"$1\" in",
        "  start) run ;;",
        "  *) usage |",
        "     less ;;",
        "esac",
    ];
    let mut session = EditSession::new();
    let mut tracker = ConstructTracker::new();
    for line in script {
        session.paste(&format!("{line}\n")).unwrap();
        tracker.analyze_line(line);
        assert_eq!(session.continuation_prompt(), tracker.get_prompt(), "after {line:?}");
    }
    assert!(tracker.is_complete());
    assert!(session.accept().unwrap().is_some());
}
