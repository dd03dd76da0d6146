//! Check command - validate configuration and list projects

use submit_queue::config::Config;

/// Print every configured project
pub fn run_check(config: &Config) {
    println!("{} project(s) configured", config.projects.len());

    for project in &config.projects {
        let scm = &project.scm;
        let host = scm.server.as_deref().unwrap_or("default host");
        println!(
            "  {}: {} {}/* on {} (branch {}, {} merge)",
            project.name, scm.kind, scm.project_name, host, scm.branch, scm.merge_method
        );
        println!(
            "    tests: {} {}",
            project.test.method.as_deref().unwrap_or("POST"),
            project.test.url
        );
    }
}
