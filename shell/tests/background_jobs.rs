//! Background-job reaping through the real SIGCHLD handler.
//!
//! `reap_background` waits on any child, so these checks run in their own
//! single-threaded test binary (`harness = false`) where no other test can
//! own a child process.

use nix::unistd::Pid;
use pipesh::job::BackgroundNotice;
use pipesh::{Interpreter, JobControl, Outcome};
use std::thread;
use std::time::{Duration, Instant};

fn start_background(sh: &mut Interpreter, line: &str) -> Pid {
    match sh.run_line(line) {
        Ok(Outcome::Background(pid)) => pid,
        other => panic!("`{line}` should start a background job, got {other:?}"),
    }
}

/// Poll the way the prompt loop does until every pid in `pids` is reported.
fn reap_until(jobs: &JobControl, pids: &[Pid]) -> Vec<BackgroundNotice> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut notices: Vec<BackgroundNotice> = Vec::new();
    while !pids.iter().all(|pid| notices.iter().any(|n| n.pid == *pid)) {
        assert!(Instant::now() < deadline, "jobs {pids:?} not reaped, got {notices:?}");
        thread::sleep(Duration::from_millis(20));
        notices.extend(jobs.reap_background());
    }
    notices
}

fn test_sigchld_reports_finished_job() {
    let jobs = JobControl::install().unwrap();
    let mut sh = Interpreter::with_jobs(jobs.clone());

    let pid = start_background(&mut sh, "sleep 0.1 &");
    assert!(jobs.reap_background().is_empty());

    let notices = reap_until(&jobs, &[pid]);

    assert_eq!(notices, vec![BackgroundNotice { pid, code: 0 }]);
    assert_eq!(notices[0].to_string(), format!("[{pid}] done"));
}

fn test_one_signal_drains_every_exited_job() {
    let jobs = JobControl::install().unwrap();
    let mut sh = Interpreter::with_jobs(jobs.clone());

    let ok = start_background(&mut sh, "true &");
    let failed = start_background(&mut sh, "false &");
    // Both exit before the first poll, so their SIGCHLDs may coalesce.
    thread::sleep(Duration::from_millis(300));

    let mut notices = reap_until(&jobs, &[ok, failed]);
    notices.sort_by_key(|n| n.pid);

    let mut expected = vec![
        BackgroundNotice { pid: ok, code: 0 },
        BackgroundNotice {
            pid: failed,
            code: 1,
        },
    ];
    expected.sort_by_key(|n| n.pid);
    assert_eq!(notices, expected);
}

fn main() {
    let tests: [(&str, fn()); 2] = [
        ("sigchld_reports_finished_job", test_sigchld_reports_finished_job),
        ("one_signal_drains_every_exited_job", test_one_signal_drains_every_exited_job),
    ];
    for (name, test) in tests {
        test();
        println!("test {name} ... ok");
    }
}
