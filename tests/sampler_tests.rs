// Differential sampler tests: /proc parsing, CPU percentage, counter
// wraparound and reset handling.

use hostpulse::sampler::proc::{
    CpuTimes, MemInfo, NetCounters, parse_default_route_interface, parse_loadavg,
    parse_psi_some_avg10, parse_uptime_secs,
};
use hostpulse::sampler::reader::{parse_vmstat_oneshot, parse_vmstat_ticks};
use hostpulse::sampler::{counter_delta, cpu_usage, rate_per_sec};

const PROC_STAT: &str = "\
cpu  10132153 290696 3084719 46828483 16683 0 25195 175 333 111
cpu0 2503691 72712 771085 11706116 4178 0 6285 0 0 0
intr 4287231 0 0 0
ctxt 1234567
btime 1234567890
";

#[test]
fn test_cpu_times_parse() {
    let t = CpuTimes::parse(PROC_STAT).expect("parse");
    assert_eq!(t.user, 10132153);
    assert_eq!(t.nice, 290696);
    assert_eq!(t.system, 3084719);
    assert_eq!(t.idle, 46828483);
    assert_eq!(t.iowait, 16683);
    assert_eq!(t.softirq, 25195);
    assert_eq!(t.steal, 175);
    assert_eq!(t.guest, 333);
    assert_eq!(t.guest_nice, 111);
}

#[test]
fn test_cpu_times_total_excludes_guest() {
    let t = CpuTimes::parse(PROC_STAT).expect("parse");
    // guest/guest_nice are already folded into user/nice on accounting
    // kernels; the total must not count them twice.
    let expected: u64 = 10132153 + 290696 + 3084719 + 46828483 + 16683 + 25195 + 175;
    assert_eq!(t.total(), expected);
    assert_eq!(t.idle_total(), 46828483 + 16683);
}

#[test]
fn test_cpu_times_parse_short_line_tolerated() {
    let t = CpuTimes::parse("cpu  100 50 30 500 20\n").expect("parse");
    assert_eq!(t.user, 100);
    assert_eq!(t.iowait, 20);
    assert_eq!(t.irq, 0);
    assert_eq!(t.steal, 0);
}

#[test]
fn test_cpu_times_parse_missing_cpu_line() {
    assert!(CpuTimes::parse("intr 42\nctxt 7\n").is_err());
}

#[test]
fn test_cpu_usage_fifty_percent() {
    // Δtotal = 200, Δidle = 100 -> 50% busy.
    let curr = CpuTimes {
        user: 600,
        idle: 500,
        iowait: 100,
        ..Default::default()
    };
    let usage = cpu_usage(1000, 500, &curr);
    assert!((usage - 50.0).abs() < 0.5);
}

#[test]
fn test_cpu_usage_zero_delta() {
    let curr = CpuTimes {
        user: 500,
        idle: 500,
        ..Default::default()
    };
    // prev totals equal to current totals: no elapsed jiffies.
    assert_eq!(cpu_usage(1000, 500, &curr), 0.0);
}

#[test]
fn test_cpu_usage_bounds_on_degenerate_input() {
    // Idle delta larger than total delta must still clamp into [0,100].
    let curr = CpuTimes {
        user: 10,
        idle: 10_000,
        ..Default::default()
    };
    let usage = cpu_usage(0, 0, &curr);
    assert!((0.0..=100.0).contains(&usage));

    // Counters moving backwards (saturating) stays in range too.
    let small = CpuTimes {
        user: 1,
        idle: 1,
        ..Default::default()
    };
    let usage = cpu_usage(u64::MAX, u64::MAX, &small);
    assert!((0.0..=100.0).contains(&usage));
}

#[test]
fn test_cpu_usage_all_busy() {
    let curr = CpuTimes {
        user: 2000,
        ..Default::default()
    };
    let usage = cpu_usage(1000, 0, &curr);
    assert!((usage - 100.0).abs() < 0.5);
}

#[test]
fn test_counter_delta_monotonic() {
    assert_eq!(counter_delta(1500, 1000), 500);
    assert_eq!(counter_delta(1000, 1000), 0);
}

#[test]
fn test_counter_delta_wraparound_32bit() {
    // prev near the 32-bit boundary (>= 10 decimal digits): rollover.
    assert_eq!(counter_delta(5, 4_294_967_290), 11);
}

#[test]
fn test_counter_delta_wraparound_at_u32_max() {
    // prev exactly at the top of the 32-bit range still wraps.
    assert_eq!(counter_delta(5, u32::MAX as u64), 6);
}

#[test]
fn test_counter_delta_reset() {
    // prev far from the boundary: a smaller current value is a counter reset.
    assert_eq!(counter_delta(5, 1_000), 0);
}

#[test]
fn test_counter_delta_reset_above_32bit_range() {
    // A 64-bit counter past 2^32 (driver reload, interface re-created) can
    // only have reset; it must not be treated as a 32-bit rollover.
    assert_eq!(counter_delta(5, 5_000_000_000), 0);
    assert_eq!(counter_delta(0, u64::MAX), 0);
}

#[test]
fn test_rate_per_sec() {
    assert_eq!(rate_per_sec(2000, 1000, 1000), 1000.0);
    assert_eq!(rate_per_sec(2000, 1000, 500), 2000.0);
    // Zero dt never divides.
    assert_eq!(rate_per_sec(2000, 1000, 0), 0.0);
}

#[test]
fn test_rate_per_sec_never_negative() {
    for (curr, prev, dt) in [
        (0u64, 999u64, 1000u64),
        (5, 4_294_967_290, 1000),
        (5, 5_000_000_000, 1000),
        (0, u64::MAX, 1000),
        (7, 7, 10),
    ] {
        let rate = rate_per_sec(curr, prev, dt);
        assert!(rate >= 0.0 && rate.is_finite());
    }
}

const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     789    0    0    0     0          0         0   123456     789    0    0    0     0       0          0
  eth0: 9876543    5432    0    0    0     0          0         0  1234567    4321    0    0    0     0       0          0
";

#[test]
fn test_net_counters_parse() {
    let c = NetCounters::parse(PROC_NET_DEV, "eth0").expect("parse");
    assert_eq!(c.rx_bytes, 9876543);
    assert_eq!(c.rx_packets, 5432);
    assert_eq!(c.tx_bytes, 1234567);
    assert_eq!(c.tx_packets, 4321);
}

#[test]
fn test_net_counters_missing_interface() {
    assert!(NetCounters::parse(PROC_NET_DEV, "wlan0").is_err());
}

#[test]
fn test_net_interfaces_skip_loopback() {
    let ifaces = NetCounters::interfaces(PROC_NET_DEV);
    assert_eq!(ifaces, vec!["eth0".to_string()]);
}

#[test]
fn test_parse_loadavg() {
    let (one, five, fifteen) = parse_loadavg("0.45 0.52 0.48 2/512 12345\n").expect("parse");
    assert!((one - 0.45).abs() < 0.001);
    assert!((five - 0.52).abs() < 0.001);
    assert!((fifteen - 0.48).abs() < 0.001);
}

#[test]
fn test_parse_loadavg_too_short() {
    assert!(parse_loadavg("0.45 0.52").is_err());
}

#[test]
fn test_meminfo_parse() {
    let content = "\
MemTotal:       16384000 kB
MemFree:         2048000 kB
MemAvailable:    8192000 kB
Buffers:          512000 kB
SwapTotal:       4096000 kB
SwapFree:        4000000 kB
";
    let info = MemInfo::parse(content);
    assert_eq!(info.mem_total, 16384000 * 1024);
    assert_eq!(info.mem_available, 8192000 * 1024);
    assert_eq!(info.swap_total, 4096000 * 1024);
    assert_eq!(info.swap_free, 4000000 * 1024);
}

#[test]
fn test_meminfo_parse_garbage_defaults_zero() {
    let info = MemInfo::parse("nothing useful here\n");
    assert_eq!(info.mem_total, 0);
    assert_eq!(info.swap_total, 0);
}

#[test]
fn test_parse_psi_some_avg10() {
    let content = "\
some avg10=1.25 avg60=0.80 avg300=0.40 total=123456
full avg10=0.10 avg60=0.05 avg300=0.02 total=6543
";
    let v = parse_psi_some_avg10(content).expect("psi");
    assert!((v - 1.25).abs() < 0.001);
}

#[test]
fn test_parse_psi_missing_some_line() {
    assert!(parse_psi_some_avg10("full avg10=0.10 total=1\n").is_none());
}

#[test]
fn test_parse_default_route_interface() {
    let content = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0001A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";
    assert_eq!(
        parse_default_route_interface(content).as_deref(),
        Some("eth0")
    );
}

#[test]
fn test_parse_default_route_none_without_default() {
    let content = "\
Iface\tDestination\tGateway \tFlags
eth0\t0001A8C0\t00000000\t0001
";
    assert!(parse_default_route_interface(content).is_none());
}

#[test]
fn test_parse_uptime() {
    assert_eq!(parse_uptime_secs("350735.47 234388.90\n"), Some(350735));
    assert_eq!(parse_uptime_secs(""), None);
}

#[test]
fn test_parse_vmstat_ticks() {
    let output = "\
     16384000 K total memory
      123456 non-nice user cpu ticks
         789 nice user cpu ticks
       45678 system cpu ticks
     9876543 idle cpu ticks
        1234 IO-wait cpu ticks
           0 IRQ cpu ticks
         567 softirq cpu ticks
          89 stolen cpu ticks
";
    let t = parse_vmstat_ticks(output);
    assert_eq!(t.user, 123456);
    assert_eq!(t.nice, 789);
    assert_eq!(t.system, 45678);
    assert_eq!(t.idle, 9876543);
    assert_eq!(t.iowait, 1234);
    assert_eq!(t.softirq, 567);
    assert_eq!(t.steal, 89);
}

#[test]
fn test_parse_vmstat_oneshot() {
    let output = "\
procs -----------memory---------- ---swap-- -----io---- -system-- ------cpu-----
 r  b   swpd   free   buff  cache   si   so    bi    bo   in   cs us sy id wa st
 1  0      0 204800  51200 409600    0    0     1     2   30   40  5  2 92  1  0
 2  0      0 204700  51200 409600    0    0     0     8  120  150 20  5 70  5  0
";
    let usage = parse_vmstat_oneshot(output).expect("oneshot");
    assert!((usage - 30.0).abs() < 0.001);
}

#[cfg(target_os = "linux")]
mod on_linux {
    use hostpulse::sampler::{Sampler, primary_interface};

    #[test]
    fn test_sample_produces_valid_record() {
        let mut sampler = Sampler::default();
        let interface = primary_interface().unwrap_or_else(|| "lo".into());
        let record = sampler.sample(&interface);
        // First tick seeds the counter store.
        assert!(sampler.last_snapshot().is_some());
        assert!((0.0..=100.0).contains(&record.cpu.usage));
        assert!((0.0..=100.0).contains(&record.memory.used_percentage));
        assert!((0.0..=100.0).contains(&record.swap.used_percentage));
        assert!((0.0..=100.0).contains(&record.disk.used_percentage));
        assert!(record.network.total_rx_speed >= 0.0);
        assert!(record.network.total_tx_speed >= 0.0);
        assert!(record.timestamp > 0);
        assert!(!record.os.hostname.is_empty());

        // Second tick computes real deltas against the stored snapshot.
        let second = sampler.sample(&interface);
        assert!((0.0..=100.0).contains(&second.cpu.usage));
        assert!(second.timestamp >= record.timestamp);
    }
}
