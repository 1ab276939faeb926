/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration options for a single run of the isolation engine. Created
//! from command line arguments.

use getopts::Options;
use serde::{Deserialize, Serialize};

/// Global flags for the isolation engine, currently set on the command line.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Opts {
    /// Comma-separated list of origins to isolate in their own processes
    /// (`--isolate-origins`). Takes effect regardless of
    /// `disable_site_isolation`.
    pub isolated_origins: Option<String>,

    /// Comma-separated list of origins to isolate delivered by a field trial
    /// rather than the command line (`--isolate-origins-trial`). Unlike
    /// `isolated_origins`, this list is suppressed by the opt-out switch.
    pub field_trial_isolated_origins: Option<String>,

    /// True to give every site a dedicated process (`--site-per-process`).
    pub site_per_process: bool,

    /// True to partition processes by full origin rather than by site
    /// (`--strict-origin-isolation`).
    pub strict_origin_isolation: bool,

    /// Opt out of site isolation (`--disable-site-isolation`). Command-line
    /// isolated origins still apply; field-trial origins and isolation modes
    /// do not.
    pub disable_site_isolation: bool,

    /// Soft cap on the number of live renderer processes
    /// (`--process-limit`). Sites that require a dedicated process may
    /// exceed it. `None` means no cap.
    pub process_limit: Option<usize>,
}

pub fn default_opts() -> Opts {
    Opts {
        isolated_origins: None,
        field_trial_isolated_origins: None,
        site_per_process: false,
        strict_origin_isolation: false,
        disable_site_isolation: false,
        process_limit: None,
    }
}

impl Default for Opts {
    fn default() -> Self {
        default_opts()
    }
}

impl Opts {
    /// Parse command line arguments. The first argument is expected to be the
    /// application name, as in `std::env::args`.
    pub fn from_cmdline_args(args: &[String]) -> Result<Opts, String> {
        let (app_name, args) = args.split_first().ok_or("empty argument list")?;

        let opts = Opts::options();
        let opt_match = opts.parse(args).map_err(|failure| failure.to_string())?;

        if opt_match.opt_present("h") || opt_match.opt_present("help") {
            return Err(opts.usage(&format!("Usage: {} [options]", app_name)));
        }

        let process_limit = match opt_match.opt_str("process-limit") {
            Some(limit) => Some(
                limit
                    .parse::<usize>()
                    .map_err(|_| format!("invalid process limit: {}", limit))?,
            ),
            None => None,
        };

        Ok(Opts {
            isolated_origins: opt_match.opt_str("isolate-origins"),
            field_trial_isolated_origins: opt_match.opt_str("isolate-origins-trial"),
            site_per_process: opt_match.opt_present("site-per-process"),
            strict_origin_isolation: opt_match.opt_present("strict-origin-isolation"),
            disable_site_isolation: opt_match.opt_present("disable-site-isolation"),
            process_limit,
        })
    }

    fn options() -> Options {
        let mut opts = Options::new();
        opts.optopt(
            "",
            "isolate-origins",
            "Comma-separated list of origins to put in dedicated processes",
            "https://isolated.example,https://bank.example",
        );
        opts.optopt(
            "",
            "isolate-origins-trial",
            "Field-trial supplied list of origins to put in dedicated processes",
            "https://isolated.example",
        );
        opts.optflag("", "site-per-process", "Give every site a dedicated process");
        opts.optflag(
            "",
            "strict-origin-isolation",
            "Partition processes by full origin instead of by site",
        );
        opts.optflag("", "disable-site-isolation", "Opt out of site isolation");
        opts.optopt(
            "",
            "process-limit",
            "Soft cap on the number of live renderer processes",
            "8",
        );
        opts.optflag("h", "help", "Print this message");
        opts
    }
}
