mod cucumber;
mod support;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use futures_util::FutureExt;
use hashpay_engine::PaymentGatewayDatabase;
use log::*;
use tokio::runtime::Runtime;

use crate::cucumber::ReconciliationWorld;

fn main() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        ReconciliationWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut ReconciliationWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        let Some(system) = world.and_then(|w| w.system.take()) else {
            warn!("🚀️ No system was created for \"{}\". Nothing to clean up.", scenario.name);
            return;
        };
        match ev {
            ScenarioFinished::StepPassed => {
                debug!("🚀️ Scenario complete, removing database: {}", system.db.url());
                system.tear_down().await;
            },
            ScenarioFinished::StepFailed(_, _, _) | ScenarioFinished::StepSkipped => {
                error!("🚀️ Error in scenario, database retained: {}", system.db.url());
                system.scheduler.stop().await;
            },
            _ => trace!("🚀️ Unhandled event: {ev:?}"),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
