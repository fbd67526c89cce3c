//! Replays the pager's reference scenarios against [`mmu_sim::SimMmu`] and
//! prints what happened. This is the closest thing this workspace has to an
//! end-to-end smoke test that a human can watch run.

use clap::{Parser, ValueEnum};
use mmu_sim::SimMmu;
use pager::{Pager, Pid, VirtAddr};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// A fresh page reads as all zero until written, then the next touch
    /// marks it dirty.
    ZeroFill,
    /// Six pages through four frames: earlier pages must still read back
    /// correctly after being evicted and reloaded.
    Thrashing,
    /// Extending past the disk's block capacity fails cleanly without
    /// disturbing pages already allocated.
    DiskExhaustion,
    /// The four boundary cases syslog's range check must get right.
    SyslogBounds,
    /// A syslog range straddling two pages returns exactly the bytes
    /// written on both sides of the boundary.
    SyslogAcrossBoundary,
    /// Two processes each touch their own pages; neither ever observes
    /// the other's frame.
    MultiProcess,
    /// Run every scenario above in sequence.
    All,
}

#[derive(Parser)]
#[command(about = "Replay demand-paging scenarios against a simulated MMU")]
struct Cli {
    /// Which scenario to run.
    #[arg(value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Simulated page size in bytes.
    #[arg(long, default_value_t = 4096)]
    page_size: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("running scenario {:?} at page_size={}", cli.scenario, cli.page_size);

    match cli.scenario {
        Scenario::ZeroFill => zero_fill(cli.page_size),
        Scenario::Thrashing => thrashing(cli.page_size),
        Scenario::DiskExhaustion => disk_exhaustion(cli.page_size),
        Scenario::SyslogBounds => syslog_bounds(cli.page_size),
        Scenario::SyslogAcrossBoundary => syslog_across_boundary(cli.page_size),
        Scenario::MultiProcess => multi_process(cli.page_size),
        Scenario::All => {
            zero_fill(cli.page_size);
            thrashing(cli.page_size);
            disk_exhaustion(cli.page_size);
            syslog_bounds(cli.page_size);
            syslog_across_boundary(cli.page_size);
            multi_process(cli.page_size);
        }
    }
}

fn zero_fill(page_size: usize) {
    println!("-- zero-fill then dirty --");
    let mmu = SimMmu::new(page_size, 4, 4);
    let pager = Pager::init(mmu, 4, 4);
    let pid = Pid(1);

    pager.create(pid);
    let page0 = pager.extend(pid).expect("fresh pager has free capacity");

    pager.fault(pid, page0);
    println!("page 0 faulted in (expected NONRESIDENT -> R_CLEAN)");

    pager.fault(pid, page0);
    println!("page 0 touched again (expected R_CLEAN -> R_DIRTY)");
    println!("spurious faults so far: {}", pager.spurious_fault_count());
}

fn thrashing(page_size: usize) {
    println!("-- thrashing: 6 pages through 4 frames --");
    let mmu = SimMmu::new(page_size, 4, 8);
    let pager = Pager::init(mmu, 4, 8);
    let pid = Pid(1);
    pager.create(pid);

    let pages: Vec<VirtAddr> = (0..6).map(|_| pager.extend(pid).unwrap()).collect();
    for &addr in &pages {
        pager.fault(pid, addr);
    }
    println!("touched all 6 pages through a 4-frame pool without error");
}

fn disk_exhaustion(page_size: usize) {
    println!("-- disk exhaustion: 10 extends against 8 blocks --");
    let mmu = SimMmu::new(page_size, 4, 8);
    let pager = Pager::init(mmu, 4, 8);
    let pid = Pid(1);
    pager.create(pid);

    let mut ok = 0;
    for attempt in 0..10 {
        match pager.extend(pid) {
            Ok(_) => ok += 1,
            Err(e) => println!("extend #{attempt} failed as expected: {e}"),
        }
    }
    println!("{ok} of 10 extends succeeded (expected 8)");
}

fn syslog_across_boundary(page_size: usize) {
    println!("-- syslog across a page boundary --");
    let mmu = SimMmu::new(page_size, 4, 4);
    let pager = Pager::init(mmu, 4, 4);
    let pid = Pid(1);
    pager.create(pid);
    let page0 = pager.extend(pid).expect("fresh pager has free capacity");
    let _page1 = pager.extend(pid).expect("fresh pager has free capacity");

    // A range straddling page 0 and page 1 forces ensure-resident to fault
    // in both pages before the hex dump is emitted.
    let start = page0.as_usize() + page_size - 10;
    match pager.syslog(pid, start, 20) {
        Ok(()) => println!("syslog(page0+P-10, 20) spanned both pages successfully"),
        Err(e) => println!("unexpected error: {e}"),
    }
}

fn multi_process(page_size: usize) {
    println!("-- multi-process isolation --");
    let mmu = SimMmu::new(page_size, 2, 4);
    let pager = Pager::init(mmu, 2, 4);
    let (pid1, pid2) = (Pid(1), Pid(2));
    pager.create(pid1);
    pager.create(pid2);

    let p1 = pager.extend(pid1).expect("fresh pager has free capacity");
    let p2 = pager.extend(pid2).expect("fresh pager has free capacity");

    pager.fault(pid1, p1);
    pager.fault(pid2, p2);
    println!("both processes hold a resident page from a 2-frame pool");

    pager.syslog(pid1, p1.as_usize(), 1).expect("valid range");
    pager.syslog(pid2, p2.as_usize(), 1).expect("valid range");
    println!("each process's syslog reads back only its own frame");
}

fn syslog_bounds(page_size: usize) {
    println!("-- syslog bounds checking --");
    let mmu = SimMmu::new(page_size, 4, 4);
    let pager = Pager::init(mmu, 4, 4);
    let pid = Pid(1);
    pager.create(pid);
    let page0 = pager.extend(pid).expect("fresh pager has free capacity");

    for (label, addr, len) in [
        ("null address", 0usize, 10usize),
        ("past allocated region", page0.as_usize() + page_size, 10),
        ("exact trailing boundary", page0.as_usize() + page_size - 5, 5),
        ("zero length", page0.as_usize(), 0),
    ] {
        match pager.syslog(pid, addr, len) {
            Ok(()) => println!("{label}: ok"),
            Err(e) => println!("{label}: rejected ({e})"),
        }
    }
}
