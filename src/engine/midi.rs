//! MIDI input for the sampler.
//!
//! Parses incoming channel messages and pushes them into the event ring the
//! audio callback drains. Sound controllers (volume, cutoff, resonance and
//! the envelope times) write straight into the shared parameter table.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{info, warn};

use super::events::{controller_parameter, controller_value};
use super::SamplerEvent;
use crate::params::SharedParameters;

/// Open MIDI input connection; dropping it disconnects.
pub struct MidiListener {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Connect to the first port whose name contains `port_name` (or the
    /// first port) and forward its events into `events` and `parameters`.
    pub fn connect(
        port_name: Option<&str>,
        mut events: rtrb::Producer<SamplerEvent>,
        parameters: Arc<SharedParameters>,
    ) -> Result<Self> {
        let mut midi_in = MidiInput::new("Sampler MIDI Input")?;
        midi_in.ignore(Ignore::All);
        let ports = midi_in.ports();

        if ports.is_empty() {
            return Err(anyhow!("No MIDI input ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name_actual = midi_in.port_name(&port)?;
        let connection = midi_in
            .connect(
                &port,
                "sampler-input",
                move |_timestamp, bytes, _| {
                    if let Some(event) = SamplerEvent::from_midi(bytes) {
                        route(event, &mut events, &parameters);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("failed to connect to MIDI port: {}", e))?;

        info!("MIDI input connected to: {}", port_name_actual);

        Ok(Self {
            _connection: connection,
            port_name: port_name_actual,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Send a controller to its parameter, everything else to the queue
fn route(event: SamplerEvent, events: &mut rtrb::Producer<SamplerEvent>, parameters: &SharedParameters) {
    if let SamplerEvent::Controller { number, value } = event {
        if let Some(id) = controller_parameter(number) {
            parameters.set(id, controller_value(id, value));
            return;
        }
    }
    if events.push(event).is_err() {
        warn!("event queue full, dropping {:?}", event);
    }
}

/// List available MIDI input ports.
pub fn list_midi_inputs() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("Sampler MIDI List")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::params::{ParameterId, Parameters};

    #[test]
    fn test_route_splits_controllers_from_events() {
        let parameters = SharedParameters::new(&Parameters::default());
        let (mut producer, mut consumer) = rtrb::RingBuffer::new(4);

        route(SamplerEvent::Controller { number: 7, value: 0 }, &mut producer, &parameters);
        route(SamplerEvent::Controller { number: 1, value: 64 }, &mut producer, &parameters);
        route(SamplerEvent::note_on(60, 100), &mut producer, &parameters);

        assert_eq!(parameters.get(ParameterId::MasterVolume), 0.0);
        assert_eq!(
            consumer.pop().ok(),
            Some(SamplerEvent::Controller { number: 1, value: 64 })
        );
        assert_eq!(consumer.pop().ok(), Some(SamplerEvent::note_on(60, 100)));
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_route_drops_when_queue_is_full() {
        let parameters = SharedParameters::default();
        let (mut producer, mut consumer) = rtrb::RingBuffer::new(1);

        route(SamplerEvent::NoteOff { note: 1 }, &mut producer, &parameters);
        route(SamplerEvent::NoteOff { note: 2 }, &mut producer, &parameters);

        assert_eq!(consumer.pop().ok(), Some(SamplerEvent::NoteOff { note: 1 }));
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_list_midi_inputs() {
        // Just verify it doesn't panic
        let _ = list_midi_inputs();
    }
}
