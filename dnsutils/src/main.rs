use std::cmp::max;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dnsutils::{Error, Question, Resolver, Response};
use owo_colors::{OwoColorize, Style};

mod args;

use args::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut resolver = Resolver::new(args.options.clone());
    for (name, addrs) in &args.hosts {
        resolver = resolver.with_host(name.clone(), addrs.clone());
    }
    if let Some(nameserver) = &args.nameserver {
        match resolver.set_dns_server(nameserver) {
            Ok(()) => {}
            // the system resolver has been installed instead
            Err(e @ Error::UnknownScheme(_)) => eprintln!("{}", e),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not use nameserver {}.", nameserver))
            }
        }
    }

    let before = Instant::now();
    if args.resolve {
        let addrs = resolver
            .resolve(&args.name)
            .with_context(|| format!("Could not resolve {}.", args.name))?;
        display_addrs(&addrs, &args, &before.elapsed())?;
    } else {
        let question = Question::new(args.name.clone(), args.qtype);
        let res = resolver
            .lookup(&question)
            .with_context(|| format!("Lookup of {} {} failed.", args.name, args.qtype))?;
        display_response(&res, &args, &before.elapsed())?;
    }

    Ok(())
}

fn init_logging(debug: bool) {
    if debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }
}

fn display_addrs(addrs: &[String], args: &Args, elapsed: &Duration) -> Result<()> {
    #[cfg(feature = "json")]
    {
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(addrs).context("Could not serialize addresses.")?
            );
            return Ok(());
        }
    }

    for addr in addrs {
        println!("{}", addr);
    }

    if args.print_meta {
        println!();
        println!(
            "{} addresses for {} in {} ms",
            addrs.len(),
            args.name,
            elapsed.as_millis()
        );
    }
    Ok(())
}

fn display_response(res: &Response, args: &Args, elapsed: &Duration) -> Result<()> {
    let output = owo_colors::Stream::Stdout;

    #[cfg(feature = "json")]
    {
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(res).context("Could not serialize response.")?
            );
            return Ok(());
        }
    }

    if args.verbose {
        println!("{}", "Questions:".if_supports_color(output, |s| s.yellow()));
        for question in &res.questions {
            println!("\t{} {} {}", question.name, question.qclass, question.qtype);
        }
        println!();
        println!("{}", "Answers:".if_supports_color(output, |s| s.yellow()));
    }

    // name, ttl, class, type, data
    let rows: Vec<_> = res
        .answers
        .iter()
        .map(|a| [&a.name, &a.ttl, &a.class, &a.rtype, &a.address])
        .chain(
            res.authorities
                .iter()
                .map(|a| [&a.name, &a.ttl, &a.class, &a.rtype, &a.mname]),
        )
        .collect();

    if rows.is_empty() {
        println!("<empty response>");
    } else {
        let mut widths = [0; 4];
        for row in &rows {
            for (width, field) in widths.iter_mut().zip(row.iter()) {
                *width = max(*width, field.len());
            }
        }
        for [name, ttl, class, rtype, data] in &rows {
            println!(
                "{:<w0$} {:>w1$} {:<w2$} {:<w3$} {}",
                name.if_supports_color(output, |s| s.bold()),
                ttl,
                class,
                rtype.if_supports_color(output, |s| s.cyan()),
                data,
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
            );
        }
    }

    if args.print_meta {
        let meta = res
            .answers
            .first()
            .map(|a| (&a.status, &a.nameserver, &a.rtt))
            .or_else(|| {
                res.authorities
                    .first()
                    .map(|a| (&a.status, &a.nameserver, &a.rtt))
            });

        println!();
        match meta {
            Some((status, nameserver, rtt)) => {
                let style = if status == "NOERROR" {
                    Style::new().green()
                } else {
                    Style::new().red()
                };
                println!(
                    "{} from {} in {} (total {} ms)",
                    status.if_supports_color(output, |s| s.style(style)),
                    nameserver,
                    rtt,
                    elapsed.as_millis()
                );
            }
            None => println!("no records in {} ms", elapsed.as_millis()),
        }
    }
    Ok(())
}
