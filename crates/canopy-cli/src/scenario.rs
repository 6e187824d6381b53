//! Demonstration graphs runnable from the command line.

use canopy_bt::nodes::{
    AlwaysFail, AlwaysSucceed, NeverComplete, Repeat, Root, Sequence, SetVariable, Timeout,
    TriggerMode, TriggerOnEvent,
};
use canopy_bt::{EventChannel, Graph, GraphError, ModuleBuilder};
use canopy_core::{Blackboard, Guid};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Root -> Repeat(3) -> AlwaysSucceed
    Repeat,
    /// Root -> Sequence[AlwaysFail, AlwaysSucceed]
    Sequence,
    /// Root -> Timeout(2s) -> NeverComplete
    Timeout,
    /// Root -> TriggerOnEvent(once) -> SetVariable(alarm = true), fired once
    Event,
}

/// A built scenario plus whatever the host has to drive from outside.
pub struct Demo {
    pub graph: Graph,
    pub alarm: Option<Guid>,
    pub channel: Option<EventChannel<()>>,
}

impl Scenario {
    pub fn build(self) -> Result<Demo, GraphError> {
        let mut b = ModuleBuilder::new(self.name());
        let module = match self {
            Scenario::Repeat => {
                let leaf = b.action(AlwaysSucceed);
                let repeat = b.modifier(Repeat::times(3), leaf);
                let root = b.modifier(Root::new(), repeat);
                b.build(root)?
            }
            Scenario::Sequence => {
                let fail = b.action(AlwaysFail);
                let never = b.action(AlwaysSucceed);
                let seq = b.composite(Sequence::new(), [fail, never]);
                let root = b.modifier(Root::new(), seq);
                b.build(root)?
            }
            Scenario::Timeout => {
                let leaf = b.action(NeverComplete);
                let timeout = b.modifier(Timeout::new(2.0), leaf);
                let root = b.modifier(Root::new(), timeout);
                b.build(root)?
            }
            Scenario::Event => return build_event(b),
        };
        Ok(Demo {
            graph: Graph::new(module),
            alarm: None,
            channel: None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Repeat => "repeat",
            Scenario::Sequence => "sequence",
            Scenario::Timeout => "timeout",
            Scenario::Event => "event",
        }
    }
}

fn build_event(mut b: ModuleBuilder) -> Result<Demo, GraphError> {
    let mut board = Blackboard::new();
    let alarm = board.define("alarm", false);
    let channel = EventChannel::new();

    let set = b.action(SetVariable::new(alarm, true));
    let trigger = b.modifier(TriggerOnEvent::new(&channel, TriggerMode::Once), set);
    let root = b.modifier(Root::new(), trigger);
    b.blackboard(board.into_shared());

    Ok(Demo {
        graph: Graph::new(b.build(root)?),
        alarm: Some(alarm),
        channel: Some(channel),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_bt::Status;
    use canopy_core::TickConfig;

    #[test]
    fn every_scenario_settles() {
        let expected = [
            (Scenario::Repeat, Status::Success),
            (Scenario::Sequence, Status::Failure),
            (Scenario::Timeout, Status::Failure),
        ];
        for (scenario, status) in expected {
            let mut demo = scenario.build().unwrap();
            let config = TickConfig {
                dt_seconds: 0.5,
                max_ticks: 100,
            };
            assert_eq!(demo.graph.run_until_quiescent(&config).unwrap(), status);
        }
    }

    #[test]
    fn event_scenario_sets_alarm_once_fired() {
        let mut demo = Scenario::Event.build().unwrap();
        demo.graph.start();
        demo.channel.as_ref().unwrap().emit(&());
        let status = demo
            .graph
            .run_until_quiescent(&TickConfig::default())
            .unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(demo.graph.get::<bool>(demo.alarm.unwrap()), Ok(true));
    }
}
