use proptest::prelude::*;

use carrylab_runner::metrics::{
    bar_returns, max_drawdown, sharpe_ratio, sortino_ratio, total_return, win_rate,
};

fn nav_path() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05f64..0.05, 2..200).prop_map(|rets| {
        let mut nav = 1_000.0;
        let mut out = vec![nav];
        for r in rets {
            nav *= 1.0 + r;
            out.push(nav);
        }
        out
    })
}

proptest! {
    #[test]
    fn drawdown_is_a_fraction_below_one(navs in nav_path()) {
        let dd = max_drawdown(&navs);
        prop_assert!(dd >= 0.0);
        prop_assert!(dd < 1.0);
    }

    #[test]
    fn win_rate_is_a_fraction(navs in nav_path()) {
        let wr = win_rate(&bar_returns(&navs));
        prop_assert!((0.0..=1.0).contains(&wr));
    }

    #[test]
    fn total_return_matches_compounded_returns(navs in nav_path()) {
        let compounded = bar_returns(&navs).iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        prop_assert!((total_return(&navs) - compounded).abs() < 1e-9);
    }

    #[test]
    fn ratios_are_finite(navs in nav_path()) {
        let r = bar_returns(&navs);
        prop_assert!(sharpe_ratio(&r, 8766.0).is_finite());
        prop_assert!(sortino_ratio(&r, 8766.0).is_finite());
    }
}
