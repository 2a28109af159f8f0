// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bodies sent to drivers and customers.

use crate::domain::{Booking, Driver};

/// Render an epoch-ms timestamp for message text.
fn format_time(ms: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(ms as i64) {
        Some(t) => t.format("%H:%M UTC, %d %b").to_string(),
        None => "unknown time".to_owned(),
    }
}

fn format_fare(fare: Option<f64>) -> String {
    match fare {
        Some(f) => format!("{f:.2}"),
        None => "to be confirmed".to_owned(),
    }
}

/// The offer broadcast to every selected driver.
pub fn driver_offer(booking: &Booking, reply_window_secs: u64) -> String {
    format!(
        "New ride request {id}\n\
         Pickup: {pickup}\n\
         Dropoff: {dropoff}\n\
         Scheduled: {when}\n\
         Passengers: {passengers}\n\
         Estimated fare: {fare}\n\
         Reply YES {id} to accept or NO {id} to decline. \
         This offer expires in {window} seconds.",
        id = booking.id,
        pickup = booking.pickup.label,
        dropoff = booking.dropoff.label,
        when = format_time(booking.scheduled_at_ms),
        passengers = booking.passengers,
        fare = format_fare(booking.estimated_fare),
        window = reply_window_secs,
    )
}

/// Told to the customer as soon as the broadcast goes out.
pub fn search_started(booking: &Booking) -> String {
    format!(
        "We are looking for a driver for your ride from {} to {}. \
         You will hear from us as soon as a driver accepts.",
        booking.pickup.label, booking.dropoff.label,
    )
}

/// Told to the customer when a driver wins the booking.
pub fn driver_assigned(booking: &Booking, driver: &Driver) -> String {
    let vehicle = driver.vehicle.as_deref().unwrap_or("vehicle details to follow");
    let rating = match driver.rating {
        Some(r) => format!("{r:.1}"),
        None => "unrated".to_owned(),
    };
    format!(
        "Driver found for your ride {id}: {name} ({rating}★, {vehicle}), \
         reachable at {phone}. Pickup {pickup} at {when}.",
        id = booking.id,
        name = driver.name,
        phone = driver.phone,
        pickup = booking.pickup.label,
        when = format_time(booking.scheduled_at_ms),
    )
}

/// Told to the customer when matching exhausts its window or no driver exists.
pub fn no_driver_available(booking: &Booking) -> String {
    format!(
        "We could not find a driver for your ride from {} to {}. \
         An operator has been notified and will contact you shortly.",
        booking.pickup.label, booking.dropoff.label,
    )
}

/// Told to drivers whose offer was taken by someone else.
pub fn offer_superseded(booking_id: &str) -> String {
    format!("Ride request {booking_id} has been taken by another driver. Thanks for standing by.")
}

/// Told to a driver whose accept arrived after the booking settled.
pub fn accept_too_late(booking_id: &str) -> String {
    format!("Ride request {booking_id} was already assigned to another driver.")
}

/// Told to drivers with open offers when the customer cancels.
pub fn offer_cancelled(booking_id: &str) -> String {
    format!("Ride request {booking_id} was cancelled by the customer. No action needed.")
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
