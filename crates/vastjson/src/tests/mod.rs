mod property_walk;
